use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    images::{
        client::FormPart,
        operations::{Echo, Operation},
        relay::{relay_asset, UploadedImage},
    },
    ledger,
    state::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub image: String,
    pub credit_balance: i32,
    #[serde(flatten)]
    pub echo: Option<Echo>,
}

pub fn to_data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// Runs one paid operation for an authenticated user: load, validate, relay,
/// call the image API, then debit. The debit happens after the external call,
/// so a call that loses the debit race has already been paid for upstream.
#[instrument(skip(st, input, image), fields(op = ?op))]
pub async fn run_operation(
    st: &AppState,
    user_id: Uuid,
    op: Operation,
    input: &HashMap<String, String>,
    image: Option<UploadedImage>,
) -> AppResult<ImageResult> {
    let shape = op.shape();

    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if shape.prechecks_balance && user.credit_balance <= 0 {
        warn!(user_id = %user_id, "no credit left");
        return Err(AppError::insufficient_credit());
    }

    let params = op.parse_params(input)?;

    let mut parts = Vec::new();
    if shape.needs_asset {
        let image = image.ok_or_else(|| AppError::bad_request("Image is required"))?;
        parts.push(relay_asset(st, image).await?);
    }
    parts.extend(
        params
            .form_fields()
            .into_iter()
            .map(|(name, value)| FormPart::Text { name, value }),
    );

    let output = st.images.process(shape.endpoint, parts).await?;

    let user = ledger::debit_one(st.users.as_ref(), user_id).await?;

    info!(user_id = %user_id, balance = user.credit_balance, "image operation completed");
    Ok(ImageResult {
        image: to_data_uri(&output),
        credit_balance: user.credit_balance,
        echo: params.echo(),
    })
}
