//! Request and response envelopes exchanged with a [`Worker`](crate::worker::Worker).
//!
//! Field names serialize in camelCase so the JSON form matches what upload
//! front ends send: `{ id, file, maxBytes?, opts? }` in, and either
//! `{ id, blob }` or `{ id, error }` out.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};

/// Raw uploaded file: bytes plus the MIME type the caller declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Per-request overrides. Unset fields fall back to the worker's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_quality: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quality: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_step: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_dimension: Option<u32>,
}

/// One compression job. `id` is opaque and echoed back in the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionRequest {
    pub id: String,
    pub file: SourceImage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<RequestOptions>,
}

/// Which step of the search produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStage {
    /// Fit at the initial dimensions by lowering quality.
    Quality,
    /// Fit after shrinking dimensions.
    Dimensions,
    /// Budget-agnostic encode at the floor; may exceed the budget.
    Fallback,
}

/// Encoded output plus how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub stage: SearchStage,
}

impl CompressedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the payload is within `max_bytes`.
    pub fn fits(&self, max_bytes: u64) -> bool {
        self.bytes.len() as u64 <= max_bytes
    }

    /// File extension matching the payload's container.
    pub fn extension(&self) -> &'static str {
        OutputFormat::from_mime(&self.mime)
            .map(OutputFormat::extension)
            .unwrap_or("bin")
    }
}

/// Exactly one of these is emitted per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompressionResult {
    Success { id: String, blob: CompressedImage },
    Failure { id: String, error: String },
}

impl CompressionResult {
    pub fn id(&self) -> &str {
        match self {
            CompressionResult::Success { id, .. } | CompressionResult::Failure { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompressionResult::Success { .. })
    }

    pub fn into_result(self) -> Result<CompressedImage, String> {
        match self {
            CompressionResult::Success { blob, .. } => Ok(blob),
            CompressionResult::Failure { error, .. } => Err(error),
        }
    }
}
