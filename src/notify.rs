use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::error::BackendError;
use crate::models::Notification;
use crate::traits::Notifier;

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Sends mail through a transactional email HTTP API.
pub struct EmailApiNotifier {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl EmailApiNotifier {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        from: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Notifier for EmailApiNotifier {
    fn kind(&self) -> &str {
        "email-api"
    }

    async fn send(&self, message: &Notification) -> Result<(), BackendError> {
        let body = EmailRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html_body,
        };

        let mut request = self.client.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Used when no email API is configured. The message is logged and reported
/// as undelivered.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn kind(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &Notification) -> Result<(), BackendError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Email delivery not configured, message logged only"
        );
        Err(BackendError::Unavailable(
            "email delivery is not configured".to_string(),
        ))
    }
}
