//! Two-phase budget search.
//!
//! ```text
//! initial dims ──► quality ladder ──fit──► done (stage: quality)
//!                      │ exhausted
//!                      ▼
//!        shrink ×0.8 ──► quality ladder (reset to start) ──fit──► done (stage: dimensions)
//!          ▲    │ exhausted
//!          └────┘ until the longer edge reaches min_dimension
//!                      │
//!                      ▼
//!        floor dims @ min_quality ──► done (stage: fallback, may exceed budget)
//! ```
//!
//! The first encode that fits wins; the search never looks for the smallest
//! payload. Dimensions and quality only go down, except that quality restarts
//! at `start_quality` on every new dimension level.

use super::backend::{BackendError, SurfaceEncoder};
use super::calculations::{
    DimensionLadder, aspect_ratio, fallback_dimensions, plan_initial_dimensions,
};
use super::params::{EncodeParams, Quality};
use crate::config::CompressOptions;
use crate::types::SearchStage;
use tracing::{debug, warn};

/// Slack added before flooring the rung count, so a ladder that lands on
/// `min_quality` keeps that rung despite float error.
const LADDER_EPSILON: f64 = 1e-4;

/// Payload produced by the search along with the parameters that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
    pub stage: SearchStage,
}

/// Descending quality values from `start` to `min` inclusive.
///
/// The rung count is computed up front, so float error in repeated
/// subtraction can neither add a rung below `min` nor drop the last one.
pub fn quality_ladder(start: f32, min: f32, step: f32) -> Vec<Quality> {
    let span = (start as f64 - min as f64).max(0.0);
    let rungs = (span / step as f64 + LADDER_EPSILON).floor() as usize;
    (0..=rungs)
        .map(|i| {
            let q = start as f64 - i as f64 * step as f64;
            Quality::new((q as f32).max(min))
        })
        .collect()
}

/// Encode once, rejecting empty payloads.
fn encode_checked(
    encoder: &impl SurfaceEncoder,
    dims: (u32, u32),
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let (width, height) = dims;
    let bytes = encoder.encode(&EncodeParams {
        width,
        height,
        quality,
    })?;
    debug!(width, height, %quality, bytes = bytes.len(), "encode attempt");
    if bytes.is_empty() {
        return Err(BackendError::Encode(format!(
            "encoder produced an empty {width}x{height} image"
        )));
    }
    Ok(bytes)
}

/// Walk the quality ladder at fixed dimensions.
///
/// Returns the first payload within `max_bytes`, or `None` when every rung is
/// too large. Lossless formats ignore quality, so they get a single rung.
pub fn search_quality(
    encoder: &impl SurfaceEncoder,
    dims: (u32, u32),
    options: &CompressOptions,
    stage: SearchStage,
) -> Result<Option<Encoded>, BackendError> {
    let mut ladder = quality_ladder(
        options.start_quality,
        options.min_quality,
        options.quality_step,
    );
    if encoder.output_format().is_lossless() {
        ladder.truncate(1);
    }

    for quality in ladder {
        let bytes = encode_checked(encoder, dims, quality)?;
        if bytes.len() as u64 <= options.max_bytes {
            return Ok(Some(Encoded {
                bytes,
                width: dims.0,
                height: dims.1,
                quality,
                stage,
            }));
        }
    }
    Ok(None)
}

/// Shrink-and-retry until a level fits or the ladder reaches the floor.
///
/// Each level restarts the quality ladder. On `None`, `ladder.current()` is
/// the last level tried.
pub fn search_dimensions(
    encoder: &impl SurfaceEncoder,
    ladder: &mut DimensionLadder,
    options: &CompressOptions,
) -> Result<Option<Encoded>, BackendError> {
    for dims in ladder.by_ref() {
        debug!(width = dims.0, height = dims.1, "shrinking");
        if let Some(found) = search_quality(encoder, dims, options, SearchStage::Dimensions)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Budget-agnostic last resort: floor dimensions at `min_quality`.
///
/// Always yields a non-empty payload or an encoder error, never `None`.
pub fn fallback_encode(
    encoder: &impl SurfaceEncoder,
    last: (u32, u32),
    options: &CompressOptions,
) -> Result<Encoded, BackendError> {
    let aspect = aspect_ratio(encoder.source_dimensions().as_tuple());
    let dims = fallback_dimensions(aspect, options.min_dimension, last);
    let quality = Quality::new(options.min_quality);
    let bytes = encode_checked(encoder, dims, quality)?;
    if bytes.len() as u64 > options.max_bytes {
        warn!(
            width = dims.0,
            height = dims.1,
            bytes = bytes.len(),
            max_bytes = options.max_bytes,
            "budget unreachable, returning oversized fallback"
        );
    }
    Ok(Encoded {
        bytes,
        width: dims.0,
        height: dims.1,
        quality,
        stage: SearchStage::Fallback,
    })
}

/// Run the full search: initial dimensions, then shrinking, then fallback.
pub fn run_search(
    encoder: &impl SurfaceEncoder,
    options: &CompressOptions,
) -> Result<Encoded, BackendError> {
    let source = encoder.source_dimensions().as_tuple();
    let initial = plan_initial_dimensions(source, options.bounds());
    debug!(
        source_width = source.0,
        source_height = source.1,
        width = initial.0,
        height = initial.1,
        "planned initial dimensions"
    );

    if let Some(found) = search_quality(encoder, initial, options, SearchStage::Quality)? {
        return Ok(found);
    }

    let mut ladder = DimensionLadder::new(source, initial, options.min_dimension);
    if let Some(found) = search_dimensions(encoder, &mut ladder, options)? {
        return Ok(found);
    }

    fallback_encode(encoder, ladder.current(), options)
}
