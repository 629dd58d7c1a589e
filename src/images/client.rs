//! HTTP client for the external image-processing API.

use axum::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use tracing::{debug, error};

use crate::{config::ClipdropConfig, error::AppError};

/// One part of the multipart form sent upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text { name: &'static str, value: String },
    Image { name: &'static str, bytes: Bytes },
}

#[derive(Debug, thiserror::Error)]
pub enum ImageApiError {
    /// Network, DNS, TLS or body decoding failure.
    #[error("image API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("image API error ({status}): {body}")]
    Upstream { status: u16, body: String },
}

impl From<ImageApiError> for AppError {
    fn from(err: ImageApiError) -> Self {
        AppError::internal(err.to_string())
    }
}

#[async_trait]
pub trait ImageApi: Send + Sync {
    /// Posts `parts` to `endpoint` and returns the raw image bytes.
    async fn process(&self, endpoint: &str, parts: Vec<FormPart>) -> Result<Bytes, ImageApiError>;
}

pub struct ClipdropClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ClipdropClient {
    pub fn new(client: reqwest::Client, cfg: &ClipdropConfig) -> Self {
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        }
    }

    fn form(parts: Vec<FormPart>) -> Result<Form, ImageApiError> {
        let mut form = Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::Image { name, bytes } => form.part(
                    name,
                    Part::bytes(bytes.to_vec())
                        .file_name("image.png")
                        .mime_str("image/png")?,
                ),
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl ImageApi for ClipdropClient {
    async fn process(&self, endpoint: &str, parts: Vec<FormPart>) -> Result<Bytes, ImageApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .multipart(Self::form(parts)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, endpoint, "image API rejected request");
            return Err(ImageApiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        debug!(endpoint, len = bytes.len(), "image API responded");
        Ok(bytes)
    }
}
