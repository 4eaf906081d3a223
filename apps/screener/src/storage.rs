//! Document store — thin wrapper over S3-compatible object storage.
//!
//! Bucket layout (one prefix per job):
//!   <job>/                JD pdf, derived <jd>.txt, derived <jd>.json
//!   <job>/resumes/        resume PDFs
//!   <job>/parsed/         derived resume .txt files

use anyhow::{anyhow, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::info;

#[derive(Clone)]
pub struct DocumentStore {
    s3: S3Client,
    bucket: String,
}

impl DocumentStore {
    pub fn new(s3: S3Client, bucket: String) -> Self {
        Self { s3, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Folder names directly under `prefix` (no recursion, no trailing slash).
    pub async fn list_folders(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = normalize_prefix(prefix);
        let response = self
            .s3
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .delimiter("/")
            .send()
            .await
            .map_err(|e| anyhow!("S3 list failed for '{prefix}': {e}"))?;

        Ok(response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .filter_map(|p| {
                p.strip_prefix(&prefix)
                    .map(|rest| rest.trim_end_matches('/').to_string())
            })
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// File names directly under `prefix` (no recursion).
    pub async fn list_files(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = normalize_prefix(prefix);
        let response = self
            .s3
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .delimiter("/")
            .send()
            .await
            .map_err(|e| anyhow!("S3 list failed for '{prefix}': {e}"))?;

        Ok(response
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .filter(|name| !name.is_empty())
            .collect())
    }

    pub async fn download_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("S3 download failed for '{key}': {e}"))?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| anyhow!("S3 body read failed for '{key}': {e}"))?;
        Ok(bytes.into_bytes().to_vec())
    }

    pub async fn download_text(&self, key: &str) -> Result<String> {
        let bytes = self.download_bytes(key).await?;
        String::from_utf8(bytes).map_err(|e| anyhow!("'{key}' is not valid UTF-8: {e}"))
    }

    /// Uploads text content, replacing any prior object at `key`.
    pub async fn upload_text(&self, key: &str, content: &str, content_type: &str) -> Result<()> {
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(content.as_bytes().to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| anyhow!("S3 upload failed for '{key}': {e}"))?;
        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix_adds_single_trailing_slash() {
        assert_eq!(normalize_prefix("acme-backend"), "acme-backend/");
        assert_eq!(normalize_prefix("acme-backend/"), "acme-backend/");
        assert_eq!(normalize_prefix("/acme-backend/resumes/"), "acme-backend/resumes/");
    }

    #[test]
    fn test_normalize_prefix_root_is_empty() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
    }
}
