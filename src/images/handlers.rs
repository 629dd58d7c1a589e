use std::collections::HashMap;

use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, State},
    middleware,
    routing::{post, MethodRouter},
    Router,
};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    auth::extractors::{require_session, CurrentUser},
    error::AppResult,
    extract::{AppJson, AppMultipart},
    images::{
        operations::Operation,
        relay::UploadedImage,
        services::{run_operation, ImageResult},
    },
    response::ApiResponse,
    state::AppState,
};

/// Multipart field carrying the client's image.
pub const IMAGE_FIELD: &str = "image";
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn image_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/remove-bg", asset_route(Operation::RemoveBackground))
        .route("/upscale", asset_route(Operation::Upscale))
        .route("/uncrop", asset_route(Operation::Uncrop))
        .route("/remove-text", asset_route(Operation::RemoveText))
        .route("/replace-bg", asset_route(Operation::ReplaceBackground))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

fn asset_route(op: Operation) -> MethodRouter<AppState> {
    post(
        move |State(st): State<AppState>, user: CurrentUser, AppMultipart(mp): AppMultipart| async move {
            asset_operation(st, user, op, mp).await
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
}

#[instrument(skip(st, user, body), fields(user_id = %user.id))]
pub async fn generate(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<GenerateRequest>,
) -> AppResult<ApiResponse<ImageResult>> {
    let input = HashMap::from([("prompt".to_string(), body.prompt)]);
    let result = run_operation(&st, user.id, Operation::Generate, &input, None).await?;
    Ok(ApiResponse::ok(result, Operation::Generate.shape().success_message))
}

#[instrument(skip(st, user, mp), fields(user_id = %user.0.id))]
async fn asset_operation(
    st: AppState,
    user: CurrentUser,
    op: Operation,
    mp: Multipart,
) -> AppResult<ApiResponse<ImageResult>> {
    let (input, image) = read_multipart(mp).await?;
    let result = run_operation(&st, user.0.id, op, &input, image).await?;
    Ok(ApiResponse::ok(result, op.shape().success_message))
}

/// Splits a multipart body into text fields and the first `image` file.
async fn read_multipart(
    mut mp: Multipart,
) -> AppResult<(HashMap<String, String>, Option<UploadedImage>)> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = mp.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == IMAGE_FIELD {
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".into());
            let bytes = field.bytes().await?;
            if image.is_none() && !bytes.is_empty() {
                image = Some(UploadedImage {
                    bytes,
                    content_type,
                });
            }
        } else {
            let value = field.text().await?;
            fields.insert(name, value);
        }
    }

    Ok((fields, image))
}
