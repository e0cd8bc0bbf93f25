use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
    pub digits: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub resend_api_key: String,
    pub email_from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "veriauth".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "veriauth-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
        };
        let otp = OtpConfig {
            ttl_minutes: std::env::var("OTP_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(10),
            digits: std::env::var("OTP_DIGITS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(6),
        };
        let mail = MailConfig {
            resend_api_key: std::env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Veriauth <noreply@veriauth.dev>".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            otp,
            mail,
        })
    }
}
