//! Surface encoder trait and shared types.
//!
//! The [`SurfaceEncoder`] trait is the one primitive the search needs: render
//! the decoded source at some dimensions and quality, hand back the bytes.
//!
//! The production implementation is
//! [`RustSurface`](super::rust_backend::RustSurface), built on the `image`
//! crate. Tests drive the search with a recording mock whose output size is a
//! simple function of pixel count and quality.

use super::params::{EncodeParams, OutputFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing capability: {0}")]
    Capability(String),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Renders one decoded source image at requested sizes.
///
/// An implementation is bound to a single source and a single output format
/// for its whole life, which is how the output format stays fixed for a
/// request. Every call must allocate its own surface: no state is carried
/// from one encode to the next.
pub trait SurfaceEncoder {
    /// Dimensions of the decoded source.
    fn source_dimensions(&self) -> Dimensions;

    /// Container every encode produces.
    fn output_format(&self) -> OutputFormat;

    /// Draw the source at `params.width × params.height` over opaque white and
    /// serialize it. Quality is ignored for lossless formats.
    fn encode(&self, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}
