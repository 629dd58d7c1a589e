use std::path::Path;

use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;

const UPLOAD_PREFIX: &str = "uploads/";

/// Durable storage for client uploads on their way to the image API.
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Uploads a staged local file and returns a url it can be fetched from.
    /// The local file is removed whether or not the upload succeeds.
    async fn upload_file(&self, path: &Path, content_type: &str) -> anyhow::Result<String>;
    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes>;
    async fn delete_by_url(&self, url: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    http: reqwest::Client,
    url_ttl_secs: u64,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig, http: reqwest::Client) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            http,
            url_ttl_secs: cfg.url_ttl_secs,
        })
    }

    async fn put_file(&self, path: &Path, content_type: &str) -> anyhow::Result<String> {
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("read staged upload {}", path.display()))?;
        let ext = ext_from_mime(content_type).unwrap_or("bin");
        let key = format!("{UPLOAD_PREFIX}{}.{}", Uuid::new_v4(), ext);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {key}"))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(self.url_ttl_secs),
            )?)
            .await
            .context("s3 presign_get")?;
        debug!(key = %key, "asset uploaded");
        Ok(presigned.uri().to_string())
    }
}

#[async_trait]
impl AssetStorage for Storage {
    async fn upload_file(&self, path: &Path, content_type: &str) -> anyhow::Result<String> {
        let res = self.put_file(path, content_type).await;
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(error = %e, path = %path.display(), "failed to remove staged upload");
        }
        res
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .context("fetch uploaded asset")?
            .error_for_status()
            .context("fetch uploaded asset")?
            .bytes()
            .await?;
        Ok(bytes)
    }

    async fn delete_by_url(&self, url: &str) -> anyhow::Result<()> {
        let key = key_from_url(url).with_context(|| format!("no object key in {url}"))?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }
}

/// Object key derived from the last path segment of an upload url.
pub(crate) fn key_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    if name.is_empty() {
        return None;
    }
    Some(format!("{UPLOAD_PREFIX}{name}"))
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_key_from_url() {
        assert_eq!(
            key_from_url("http://minio:9000/bucket/uploads/abc.png?X-Amz-Signature=1").as_deref(),
            Some("uploads/abc.png")
        );
        assert_eq!(
            key_from_url("https://fake.local/uploads/x.jpg").as_deref(),
            Some("uploads/x.jpg")
        );
        assert_eq!(key_from_url("https://fake.local/uploads/"), None);
    }
}
