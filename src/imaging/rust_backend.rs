//! Pure Rust surface encoder built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff format | `image::guess_format`, declared MIME as fallback |
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::ImageReader` |
//! | Scale | `DynamicImage::resize_exact` with the configured [`Resample`] filter |
//! | Opaque background | `imageops::overlay` onto a white `RgbaImage` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |

use super::backend::{BackendError, Dimensions, SurfaceEncoder};
use super::params::{EncodeParams, LossyFormat, OutputFormat, Quality, Resample};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{
    DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, Rgba, RgbImage,
    RgbaImage, imageops,
};
use std::io::Cursor;
use std::path::Path;

/// AVIF encode speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Background every surface is filled with before the source is drawn.
const SURFACE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Identify the source container.
///
/// The bytes win when they carry a recognizable signature; the declared MIME
/// type is only consulted when sniffing fails.
pub fn detect_source_format(bytes: &[u8], declared_mime: &str) -> Result<ImageFormat, BackendError> {
    if let Ok(format) = image::guess_format(bytes) {
        return Ok(format);
    }
    ImageFormat::from_mime_type(declared_mime).ok_or_else(|| {
        BackendError::Decode(format!(
            "unrecognized image data (declared type {declared_mime:?})"
        ))
    })
}

/// Verify a decoder for `source` and an encoder for `output` are compiled in.
///
/// AVIF is treated as undecodable: the `image` crate's `"avif"` feature only
/// enables the **encoder** (rav1e), yet `ImageFormat::reading_enabled()`
/// returns `true` for it.
pub fn check_capabilities(source: ImageFormat, output: OutputFormat) -> Result<(), BackendError> {
    if source == ImageFormat::Avif || !source.reading_enabled() {
        return Err(BackendError::Capability(format!(
            "no decoder available for {source:?} images"
        )));
    }
    if !output.image_format().writing_enabled() {
        return Err(BackendError::Capability(format!(
            "no encoder available for {} output",
            output.mime_type()
        )));
    }
    Ok(())
}

/// Best-effort MIME type for a file on disk, from its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Read width and height from the image header without decoding pixels.
pub fn header_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Decoded source bound to a fixed output format.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustSurface {
    image: DynamicImage,
    format: OutputFormat,
    resample: Resample,
}

impl RustSurface {
    /// Sniff, capability-check, and decode a source image.
    pub fn open(
        bytes: &[u8],
        declared_mime: &str,
        lossy: LossyFormat,
        resample: Resample,
    ) -> Result<Self, BackendError> {
        let source_format = detect_source_format(bytes, declared_mime)?;
        let format = OutputFormat::for_source(source_format, lossy);
        check_capabilities(source_format, format)?;
        let image = decode(bytes, source_format)?;
        Ok(Self {
            image,
            format,
            resample,
        })
    }

    /// Draw the source scaled to exactly `width × height` over opaque white.
    fn render(&self, width: u32, height: u32) -> RgbImage {
        let scaled = self
            .image
            .resize_exact(width, height, self.resample.filter())
            .to_rgba8();
        let mut surface = RgbaImage::from_pixel(width, height, SURFACE_BACKGROUND);
        imageops::overlay(&mut surface, &scaled, 0, 0);
        DynamicImage::ImageRgba8(surface).to_rgb8()
    }

    fn serialize(&self, surface: &RgbImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        let (width, height) = surface.dimensions();
        let mut buf = Vec::new();
        let result = match self.format {
            OutputFormat::Png => PngEncoder::new(&mut buf).write_image(
                surface.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            ),
            OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut buf, quality.percent())
                .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgb8),
            OutputFormat::Avif => {
                AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality.percent())
                    .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgb8)
            }
        };
        result.map_err(|e| {
            BackendError::Encode(format!("{} encode failed: {e}", self.format.mime_type()))
        })?;
        Ok(buf)
    }
}

/// Decode in-memory bytes of a known format.
fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, BackendError> {
    let image = ImageReader::with_format(Cursor::new(bytes), format)
        .decode()
        .map_err(|e| BackendError::Decode(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(BackendError::Decode("image has zero width or height".into()));
    }
    Ok(image)
}

impl SurfaceEncoder for RustSurface {
    fn source_dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    fn output_format(&self) -> OutputFormat {
        self.format
    }

    fn encode(&self, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::Encode(format!(
                "cannot encode a {}x{} surface",
                params.width, params.height
            )));
        }
        let surface = self.render(params.width, params.height);
        self.serialize(&surface, params.quality)
    }
}
