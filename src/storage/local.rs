use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::BackendError;
use crate::traits::BlobStore;

/// Writes images under the upload folder, which the server exposes at `/uploads`.
pub struct LocalDiskStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStore {
    pub fn new(root: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            root,
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalDiskStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(
        &self,
        bytes: &[u8],
        key: &str,
        _mime_type: &str,
    ) -> Result<String, BackendError> {
        if key.split('/').any(|part| part == "..") {
            return Err(BackendError::Unavailable(format!("refusing key {}", key)));
        }

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        Ok(format!("{}/{}", self.public_base_url.trim_end_matches('/'), key))
    }
}
