//! Shared test utilities for the snug test suite.
//!
//! Synthetic images and request builders, so unit tests never depend on
//! fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = encode_jpeg(&noise_rgb(800, 400, 1));
//! let request = jpeg_request("dog-1", bytes);
//! ```

use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

use crate::types::{CompressionRequest, RequestOptions, SourceImage};

// =========================================================================
// Pixel sources
// =========================================================================

/// Smooth gradient. Compresses very well.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Deterministic pseudo-random pixels. Compresses badly.
pub fn noise_rgb(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    RgbImage::from_fn(width, height, |_, _| {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let [r, g, b, ..] = state.to_le_bytes();
        Rgb([r, g, b])
    })
}

// =========================================================================
// Encoded sources
// =========================================================================

pub fn encode_jpeg(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 95)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

pub fn encode_png(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// PNG whose left half is fully transparent and right half is opaque red.
pub fn transparent_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([255, 0, 0, 255])
        }
    });
    encode_png(&DynamicImage::ImageRgba8(img))
}

// =========================================================================
// Requests
// =========================================================================

pub fn request(id: &str, bytes: Vec<u8>, mime: &str) -> CompressionRequest {
    CompressionRequest {
        id: id.to_string(),
        file: SourceImage {
            bytes,
            mime: mime.to_string(),
        },
        max_bytes: None,
        opts: None,
    }
}

pub fn jpeg_request(id: &str, bytes: Vec<u8>) -> CompressionRequest {
    request(id, bytes, "image/jpeg")
}

/// Request with a byte budget and option overrides.
pub fn budget_request(
    id: &str,
    bytes: Vec<u8>,
    mime: &str,
    max_bytes: u64,
    opts: RequestOptions,
) -> CompressionRequest {
    CompressionRequest {
        max_bytes: Some(max_bytes),
        opts: Some(opts),
        ..request(id, bytes, mime)
    }
}
