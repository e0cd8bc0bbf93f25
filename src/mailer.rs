use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::MailConfig;

/// Returned by a successful delivery; `message_id` is whatever the provider
/// assigned to the queued message.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// Delivery failure. Callers treat every variant the same way: the message
/// did not go out and the user must be told to retry via resend.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email provider rejected the message (status {status})")]
    Provider { status: u16 },
    #[error("mailer is not configured")]
    NotConfigured,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a one-time passcode. Best-effort, at-least-once: a returned
    /// receipt means the provider accepted the message, not that it landed.
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<DeliveryReceipt, NotifyError>;
}

/// Sends OTP emails through the Resend HTTP API.
#[derive(Clone)]
pub struct ResendMailer {
    config: MailConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl ResendMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn is_enabled(&self) -> bool {
        !self.config.resend_api_key.is_empty()
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<DeliveryReceipt, NotifyError> {
        if !self.is_enabled() {
            warn!(to = %to, "RESEND_API_KEY not set, cannot send OTP email");
            return Err(NotifyError::NotConfigured);
        }

        let html = format!(
            "<div><p>Your verification code is <strong>{code}</strong>.</p>\
             <p>It expires in {ttl_minutes} minutes.</p></div>"
        );
        let body = serde_json::json!({
            "from": self.config.email_from,
            "to": [to],
            "subject": "Your verification code",
            "html": html,
        });

        let resp = self
            .client
            .post("https://api.resend.com/emails")
            .header(
                "Authorization",
                format!("Bearer {}", self.config.resend_api_key),
            )
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            error!(to = %to, status = %status, "OTP email rejected by provider");
            return Err(NotifyError::Provider {
                status: status.as_u16(),
            });
        }

        let message_id = resp
            .json::<SendEmailResponse>()
            .await
            .map(|r| r.id)
            .unwrap_or_default();
        info!(to = %to, message_id = %message_id, "OTP email queued");
        Ok(DeliveryReceipt { message_id })
    }
}
