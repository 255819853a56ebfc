mod http;
mod local;

pub use http::HttpObjectStore;
pub use local::LocalDiskStore;

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::bounded;
use crate::traits::BlobStore;

/// Where an image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub backend: String,
}

/// Order-scoped object key: `ugc/{order}/{yyyymmdd}_{id8}_{filename}`.
pub fn object_key(order_id: &str, filename: &str) -> String {
    format!(
        "ugc/{}/{}_{}_{}",
        sanitize(order_id),
        Utc::now().format("%Y%m%d"),
        &Uuid::new_v4().simple().to_string()[..8],
        sanitize(filename)
    )
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn ensure_dirs(upload_folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder)
}

/// Blob stores tried in order until one accepts the upload.
pub struct BlobChain {
    stores: Vec<Arc<dyn BlobStore>>,
    timeout: Duration,
}

impl BlobChain {
    pub fn new(stores: Vec<Arc<dyn BlobStore>>, timeout: Duration) -> Self {
        Self { stores, timeout }
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.stores.iter().map(|s| s.name().to_string()).collect()
    }

    /// Returns `None` when every backend failed; the caller carries on without a URL.
    pub async fn upload(&self, bytes: &[u8], key: &str, mime_type: &str) -> Option<StoredBlob> {
        for store in &self.stores {
            match bounded(self.timeout, store.upload(bytes, key, mime_type)).await {
                Ok(url) => {
                    info!("Stored {} via {}: {}", key, store.name(), url);
                    return Some(StoredBlob {
                        url,
                        backend: store.name().to_string(),
                    });
                }
                Err(e) => warn!("Upload of {} to {} failed: {}", key, store.name(), e),
            }
        }

        if !self.stores.is_empty() {
            warn!("All storage backends failed for {}, continuing without a stored copy", key);
        }
        None
    }
}
