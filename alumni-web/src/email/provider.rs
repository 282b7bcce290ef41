//! Email delivery providers

use alumni_common::config::EmailConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    #[error("Email provider rejected the API key")]
    Unauthorized,

    #[error("Email provider rate limit exceeded")]
    RateLimited,

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Email provider not configured: {0}")]
    NotConfigured(String),
}

/// One message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Transactional email service
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Deliver one message, returning the provider's message id
    async fn send(&self, email: &OutgoingEmail) -> Result<String, EmailError>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// JSON email API client (`POST {base}/emails` with a bearer API key)
pub struct HttpEmailProvider {
    http_client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl HttpEmailProvider {
    pub fn new(config: &EmailConfig, api_key: String) -> Result<Self, EmailError> {
        let mut endpoint = Url::parse(&config.provider_url)
            .map_err(|e| EmailError::NotConfigured(format!("Invalid provider URL: {}", e)))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| EmailError::NotConfigured("Provider URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("emails");

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmailError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, EmailError> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .map_err(|e| EmailError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(EmailError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(EmailError::RateLimited),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                Err(EmailError::InvalidRecipient(body))
            }
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(EmailError::Api(s.as_u16(), body))
            }
            _ => {
                let parsed: SendResponse = response
                    .json()
                    .await
                    .map_err(|e| EmailError::Parse(e.to_string()))?;
                Ok(parsed.id)
            }
        }
    }
}

/// Dry-run provider: logs every message instead of sending it
#[derive(Default)]
pub struct LogEmailProvider {
    sent: AtomicU64,
}

impl LogEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, EmailError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            to = %email.to.join(", "),
            subject = %email.subject,
            "Dry run: email not sent"
        );
        Ok(format!("dry-run-{}", n))
    }
}
