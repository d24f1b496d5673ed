//! Parameter types for encode operations.
//!
//! These structs describe *what* to encode, not *how*. They are the interface
//! between the [`search`](super::search) module (which decides which
//! dimension/quality pairs to try) and the [`backend`](super::backend) (which
//! does the pixel work). The split lets the search run against a mock encoder
//! in tests.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality on the `0.0..=1.0` scale. Clamped on construction.
//! - [`OutputFormat`] — The container an encode produces. Fixed per request.
//! - [`LossyFormat`] — Which lossy container non-PNG sources are re-encoded to.
//! - [`Resample`] — Filter used when scaling the source onto the surface.
//! - [`EncodeParams`] — One encode: target dimensions plus quality.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy encoding, `0.0` (worst) to `1.0` (best).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// The quality on the `1..=100` scale the `image` encoders take.
    pub fn percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Lossy container used for every source that is not a PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossyFormat {
    #[default]
    Jpeg,
    Avif,
}

/// Container produced by an encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Avif,
}

impl OutputFormat {
    /// PNG sources stay PNG; everything else goes to the lossy container.
    pub fn for_source(source: image::ImageFormat, lossy: LossyFormat) -> Self {
        match (source, lossy) {
            (image::ImageFormat::Png, _) => OutputFormat::Png,
            (_, LossyFormat::Jpeg) => OutputFormat::Jpeg,
            (_, LossyFormat::Avif) => OutputFormat::Avif,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(OutputFormat::Png),
            "image/jpeg" => Some(OutputFormat::Jpeg),
            "image/avif" => Some(OutputFormat::Avif),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Avif => "image/avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Avif => "avif",
        }
    }

    /// Lossless formats ignore the quality knob.
    pub fn is_lossless(self) -> bool {
        matches!(self, OutputFormat::Png)
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Avif => image::ImageFormat::Avif,
        }
    }
}

/// Resampling filter used to scale the source onto the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resample {
    Nearest,
    Triangle,
    CatmullRom,
    #[default]
    Lanczos3,
}

impl Resample {
    pub fn filter(self) -> FilterType {
        match self {
            Resample::Nearest => FilterType::Nearest,
            Resample::Triangle => FilterType::Triangle,
            Resample::CatmullRom => FilterType::CatmullRom,
            Resample::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Parameters for a single encode attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}
