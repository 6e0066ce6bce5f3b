use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::info;

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};

/// Re-hosts a remote asset and returns the URL it is now served from.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, name: &str, source_url: &str) -> Result<String>;
}

/// Supabase storage over its REST API.
pub struct SupabaseStorage {
    client: Client,
    config: StorageConfig,
}

impl SupabaseStorage {
    pub fn new(client: Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    pub fn public_url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base(), self.config.bucket, name)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(&self, name: &str, source_url: &str) -> Result<String> {
        if self.config.base_url.is_empty() {
            return Err(AppError::UploadError("object storage is not configured".to_string()));
        }

        let source = self
            .client
            .get(source_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::UploadError(format!("Failed to fetch {}: {}", source_url, e)))?;
        let content_type = source
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = source
            .bytes()
            .await
            .map_err(|e| AppError::UploadError(format!("Failed to read {}: {}", source_url, e)))?;

        let url = format!("{}/storage/v1/object/{}/{}", self.base(), self.config.bucket, name);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("apikey", &self.config.api_key)
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::UploadError(format!("Failed to upload {}: {}", name, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::UploadError(format!("Upload of {} failed with {}: {}", name, status, text)));
        }

        info!(action = "object_uploaded", name = %name);
        Ok(self.public_url(name))
    }
}
