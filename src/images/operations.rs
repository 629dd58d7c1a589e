//! Table describing the six paid image operations and their inputs.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Generate,
    RemoveBackground,
    Upscale,
    Uncrop,
    RemoveText,
    ReplaceBackground,
}

/// Static shape of an operation.
#[derive(Debug)]
pub struct OperationShape {
    /// Path under the image API base url.
    pub endpoint: &'static str,
    pub needs_asset: bool,
    /// Reject a zero balance before calling out, not only at debit time.
    pub prechecks_balance: bool,
    pub success_message: &'static str,
}

const GENERATE: OperationShape = OperationShape {
    endpoint: "text-to-image/v1",
    needs_asset: false,
    prechecks_balance: true,
    success_message: "Image Generated Successfully",
};
const REMOVE_BACKGROUND: OperationShape = OperationShape {
    endpoint: "remove-background/v1",
    needs_asset: true,
    prechecks_balance: false,
    success_message: "Background removed successfully",
};
const UPSCALE: OperationShape = OperationShape {
    endpoint: "image-upscaling/v1/upscale",
    needs_asset: true,
    prechecks_balance: false,
    success_message: "Image upscaled successfully",
};
const UNCROP: OperationShape = OperationShape {
    endpoint: "uncrop/v1",
    needs_asset: true,
    prechecks_balance: false,
    success_message: "Image uncropped successfully",
};
const REMOVE_TEXT: OperationShape = OperationShape {
    endpoint: "remove-text/v1",
    needs_asset: true,
    prechecks_balance: false,
    success_message: "Text removed successfully",
};
const REPLACE_BACKGROUND: OperationShape = OperationShape {
    endpoint: "replace-background/v1",
    needs_asset: true,
    prechecks_balance: false,
    success_message: "Background replaced successfully",
};

impl Operation {
    pub fn shape(self) -> &'static OperationShape {
        match self {
            Operation::Generate => &GENERATE,
            Operation::RemoveBackground => &REMOVE_BACKGROUND,
            Operation::Upscale => &UPSCALE,
            Operation::Uncrop => &UNCROP,
            Operation::RemoveText => &REMOVE_TEXT,
            Operation::ReplaceBackground => &REPLACE_BACKGROUND,
        }
    }

    /// Validates the client's text fields for this operation.
    pub fn parse_params(self, fields: &HashMap<String, String>) -> AppResult<Params> {
        match self {
            Operation::Generate => Ok(Params::Prompt(prompt(fields)?)),
            Operation::ReplaceBackground => Ok(Params::Prompt(prompt(fields)?)),
            Operation::RemoveBackground | Operation::RemoveText => Ok(Params::None),
            Operation::Upscale => {
                let dims = positive(fields, "targetWidth")
                    .zip(positive(fields, "targetHeight"))
                    .ok_or_else(|| {
                        AppError::bad_request(
                            "targetWidth and targetHeight must be positive numbers",
                        )
                    })?;
                Ok(Params::Resize {
                    width: dims.0,
                    height: dims.1,
                })
            }
            Operation::Uncrop => {
                let ext = positive(fields, "extendLeft")
                    .zip(positive(fields, "extendDown"))
                    .ok_or_else(|| {
                        AppError::bad_request("extendLeft and extendDown must be positive numbers")
                    })?;
                Ok(Params::Extend {
                    left: ext.0,
                    down: ext.1,
                })
            }
        }
    }
}

/// Validated, operation-specific input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Params {
    None,
    Prompt(String),
    Resize { width: u32, height: u32 },
    Extend { left: u32, down: u32 },
}

/// Extra fields echoed back next to the processed image.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Echo {
    #[serde(rename_all = "camelCase")]
    Resized { new_width: u32, new_height: u32 },
    #[serde(rename_all = "camelCase")]
    Extended { extend_left: u32, extend_down: u32 },
}

impl Params {
    /// Text parts sent to the image API.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Params::None => Vec::new(),
            Params::Prompt(p) => vec![("prompt", p.clone())],
            Params::Resize { width, height } => vec![
                ("target_width", width.to_string()),
                ("target_height", height.to_string()),
            ],
            Params::Extend { left, down } => vec![
                ("extend_left", left.to_string()),
                ("extend_down", down.to_string()),
            ],
        }
    }

    pub fn echo(&self) -> Option<Echo> {
        match *self {
            Params::Resize { width, height } => Some(Echo::Resized {
                new_width: width,
                new_height: height,
            }),
            Params::Extend { left, down } => Some(Echo::Extended {
                extend_left: left,
                extend_down: down,
            }),
            _ => None,
        }
    }
}

fn prompt(fields: &HashMap<String, String>) -> AppResult<String> {
    fields
        .get("prompt")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("Prompt is required"))
}

fn positive(fields: &HashMap<String, String>, name: &str) -> Option<u32> {
    fields
        .get(name)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
}
