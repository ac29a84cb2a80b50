/*!
 * Email Module
 * Outbound transactional email via the Resend HTTP API
 */

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_BASE: &str = "https://api.resend.com";

/// Shared client, configured from the environment at first use. `None` when
/// no API key is set, which every caller must treat as "email disabled".
pub static EMAIL: Lazy<Option<EmailClient>> = Lazy::new(EmailClient::from_env);

/// One outbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchSendResponse {
    data: Vec<SendResponse>,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("failed to reach email provider: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email provider returned {status}: {body}")]
    Provider {
        status: reqwest::StatusCode,
        body: String,
    },
}

pub struct EmailClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    from: String,
}

impl EmailClient {
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY").ok()?;
        if api_key.is_empty() {
            return None;
        }
        let from = std::env::var("NEWSLETTER_FROM")
            .unwrap_or_else(|_| "newsletter@example.com".to_string());
        Some(Self::new(api_key, from, API_BASE.to_string()))
    }

    pub fn new(api_key: String, from: String, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            base_url,
            from,
        }
    }

    /// The configured sender address.
    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Send one message. POST /emails.
    pub async fn send(&self, message: &Message) -> Result<String, EmailError> {
        let url = format!("{}/emails", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Provider { status, body });
        }

        let parsed: SendResponse = response.json().await?;
        Ok(parsed.id)
    }

    /// Submit a whole batch as one call. POST /emails/batch. The provider
    /// reports acceptance of the batch, not per-recipient delivery.
    pub async fn send_batch(&self, messages: &[Message]) -> Result<usize, EmailError> {
        if messages.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/emails/batch", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(messages)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Provider { status, body });
        }

        let parsed: BatchSendResponse = response.json().await?;
        Ok(parsed.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_to_provider_shape() {
        let message = Message {
            from: "a@example.com".to_string(),
            to: "b@example.com".to_string(),
            subject: "Hi".to_string(),
            html: "<p>Hi</p>".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["from"], "a@example.com");
        assert_eq!(json["to"], "b@example.com");
        assert_eq!(json["subject"], "Hi");
        assert_eq!(json["html"], "<p>Hi</p>");
    }

    #[tokio::test]
    async fn test_send_batch_empty_is_a_noop() {
        let client = EmailClient::new(
            "key".to_string(),
            "from@example.com".to_string(),
            // Unroutable base URL: the empty batch must return before any
            // request is attempted.
            "http://127.0.0.1:1".to_string(),
        );
        assert_eq!(client.send_batch(&[]).await.unwrap(), 0);
    }
}
