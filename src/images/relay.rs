//! Moves a client upload through asset storage and into a form part for the image API.

use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    images::client::FormPart,
    state::AppState,
    storage::ext_from_mime,
};

/// Field name of the image part the image API expects.
pub const UPSTREAM_IMAGE_FIELD: &str = "input_image";

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

async fn stage(dir: &Path, image: &UploadedImage) -> anyhow::Result<PathBuf> {
    let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
    let path = dir.join(format!("imagify-{}.{}", Uuid::new_v4(), ext));
    if let Err(e) = tokio::fs::write(&path, &image.bytes).await {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e).with_context(|| format!("stage upload {}", path.display()));
    }
    Ok(path)
}

#[instrument(skip(st, image), fields(len = image.bytes.len()))]
pub async fn relay_asset(st: &AppState, image: UploadedImage) -> AppResult<FormPart> {
    let path = stage(&st.config.upload_dir, &image).await?;

    let url = st
        .storage
        .upload_file(&path, &image.content_type)
        .await
        .map_err(|e| {
            error!(error = %e, "asset upload failed");
            AppError::bad_request("Image upload failed")
        })?;

    let fetched = st.storage.fetch(&url).await;

    if let Err(e) = st.storage.delete_by_url(&url).await {
        warn!(error = %e, "failed to delete relayed asset");
    }

    let bytes = fetched.map_err(|e| {
        error!(error = %e, "relayed asset fetch failed");
        AppError::from(e)
    })?;

    Ok(FormPart::Image {
        name: UPSTREAM_IMAGE_FIELD,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_state;

    fn png() -> UploadedImage {
        UploadedImage {
            bytes: Bytes::from_static(b"\x89PNG fake"),
            content_type: "image/png".into(),
        }
    }

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn relays_bytes_and_cleans_up() {
        let (st, fakes) = fake_state();
        let part = relay_asset(&st, png()).await.expect("relay");
        assert_eq!(
            part,
            FormPart::Image {
                name: UPSTREAM_IMAGE_FIELD,
                bytes: Bytes::from_static(b"\x89PNG fake"),
            }
        );
        assert_eq!(staged_files(&st.config.upload_dir), 0);
        assert_eq!(fakes.storage.uploads(), 1);
        assert_eq!(fakes.storage.deleted(), 1);
    }

    #[tokio::test]
    async fn upload_failure_is_bad_request_and_leaves_no_temp_file() {
        let (st, fakes) = fake_state();
        fakes.storage.fail_uploads(true);
        let err = relay_asset(&st, png()).await.unwrap_err();
        assert_eq!(err.message(), "Image upload failed");
        assert!(matches!(err, AppError::BadRequest(..)));
        assert_eq!(staged_files(&st.config.upload_dir), 0);
    }

    #[tokio::test]
    async fn fetch_failure_still_deletes_the_upload() {
        let (st, fakes) = fake_state();
        fakes.storage.fail_fetches(true);
        let err = relay_asset(&st, png()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(fakes.storage.uploads(), 1);
        assert_eq!(fakes.storage.deleted(), 1);
        assert_eq!(fakes.storage.stored(), 0);
    }
}
