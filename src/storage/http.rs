use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::BackendError;
use crate::traits::BlobStore;

/// Object store reachable with authenticated `PUT {endpoint}/{key}` requests
/// (S3-compatible gateways, R2 workers and similar).
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    token: Option<String>,
    public_url: String,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: String,
        token: Option<String>,
        public_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        let public_url = public_url.unwrap_or_else(|| endpoint.clone());

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for HttpObjectStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(
        &self,
        bytes: &[u8],
        key: &str,
        mime_type: &str,
    ) -> Result<String, BackendError> {
        let mut request = self
            .client
            .put(format!("{}/{}", self.endpoint, key))
            .header("content-type", mime_type)
            .body(bytes.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(format!("{}/{}", self.public_url, key))
    }
}
