//! Single-request compression pipeline.
//!
//! A request goes through two steps, which the [`worker`](crate::worker)
//! reports as separate phases:
//!
//! 1. **Prepare**: layer the request's overrides on the defaults, validate
//!    them, sniff the source, check the codecs are compiled in, decode.
//! 2. **Search**: geometry plan, quality ladder, dimension ladder, fallback
//!    (see [`imaging::search`](crate::imaging::search)).
//!
//! Nothing survives a request: the decoded bitmap and every surface are
//! dropped before the result is returned.

use crate::config::{CompressOptions, ConfigError, EncoderConfig};
use crate::imaging::{BackendError, RustSurface, SurfaceEncoder, run_search};
use crate::types::{CompressedImage, CompressionRequest, CompressionResult};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CompressError {
    #[error(transparent)]
    Options(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Stateless request processor: defaults plus encoder settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor {
    defaults: CompressOptions,
    encoder: EncoderConfig,
}

impl Compressor {
    pub fn new(defaults: CompressOptions, encoder: EncoderConfig) -> Self {
        Self { defaults, encoder }
    }

    pub fn defaults(&self) -> &CompressOptions {
        &self.defaults
    }

    /// Resolve and validate the options for a request.
    pub fn resolve_options(
        &self,
        request: &CompressionRequest,
    ) -> Result<CompressOptions, ConfigError> {
        let options = self
            .defaults
            .with_overrides(request.max_bytes, request.opts.as_ref());
        options.validate()?;
        Ok(options)
    }

    /// Validate options, then decode the source onto a surface encoder.
    pub fn prepare(
        &self,
        request: &CompressionRequest,
    ) -> Result<(RustSurface, CompressOptions), CompressError> {
        let options = self.resolve_options(request)?;
        let surface = RustSurface::open(
            &request.file.bytes,
            &request.file.mime,
            self.encoder.lossy_format,
            self.encoder.resample,
        )?;
        Ok((surface, options))
    }

    /// Run the search against a prepared encoder.
    pub fn search(
        &self,
        encoder: &impl SurfaceEncoder,
        options: &CompressOptions,
    ) -> Result<CompressedImage, CompressError> {
        let encoded = run_search(encoder, options)?;
        Ok(CompressedImage {
            bytes: encoded.bytes,
            mime: encoder.output_format().mime_type().to_string(),
            width: encoded.width,
            height: encoded.height,
            quality: encoded.quality.value(),
            stage: encoded.stage,
        })
    }

    /// Prepare and search in one call.
    pub fn compress(&self, request: &CompressionRequest) -> Result<CompressedImage, CompressError> {
        let (surface, options) = self.prepare(request)?;
        self.search(&surface, &options)
    }

    /// Compress on the calling thread and wrap the outcome in a result envelope.
    pub fn respond(&self, request: &CompressionRequest) -> CompressionResult {
        into_result(request.id.clone(), self.compress(request))
    }
}

/// Wrap a pipeline outcome in a response envelope, logging it.
pub(crate) fn into_result(
    id: String,
    outcome: Result<CompressedImage, CompressError>,
) -> CompressionResult {
    match outcome {
        Ok(blob) => {
            info!(
                id = %id,
                bytes = blob.len(),
                width = blob.width,
                height = blob.height,
                quality = blob.quality,
                stage = ?blob.stage,
                "compressed"
            );
            CompressionResult::Success { id, blob }
        }
        Err(e) => {
            warn!(id = %id, error = %e, "compression failed");
            CompressionResult::Failure {
                id,
                error: e.to_string(),
            }
        }
    }
}
