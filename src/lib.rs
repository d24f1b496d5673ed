//! # snug
//!
//! Bounded-size adaptive image transcoding. Give it an uploaded image and a
//! byte budget; it returns a re-encoded image that fits the budget whenever
//! that is possible without going below a minimum dimension, and the smallest
//! acceptable encode when it is not.
//!
//! # Search Order
//!
//! Every request follows the same fixed order:
//!
//! ```text
//! 1. Geometry   downscale into max_width × max_height (never upscale)
//! 2. Quality    start_quality, start − step, …, min_quality   (first fit wins)
//! 3. Dimensions shrink both edges ×0.8, rerun step 2 at each level
//! 4. Fallback   floor dimensions at min_quality, returned even if too large
//! ```
//!
//! Quality is cheaper to give up than pixels, so dimensions only shrink once
//! the whole quality ladder has failed at the current size.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry math, the surface encoder, and the quality/dimension/fallback search |
//! | [`compress`] | One request end to end: option resolution, decode, search |
//! | [`worker`] | Background thread with a bounded request queue, results correlated by `id` |
//! | [`types`] | Request and response envelopes (camelCase JSON) |
//! | [`config`] | `snug.toml` loading, validation, and named presets |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Always Answer
//!
//! A request never disappears. Undecodable input, invalid options, and even a
//! panic inside the encoder turn into an `{ id, error }` response, and a budget
//! that cannot be met still produces an image, tagged `stage = "fallback"`.
//! Callers compare the blob length against their budget if they care.
//!
//! ## Output Format Follows the Source
//!
//! PNG sources stay PNG (the quality ladder collapses to one rung, since PNG
//! ignores quality). Everything else becomes the configured lossy format,
//! JPEG by default. Transparent pixels are composited onto white so the lossy
//! output has no alpha surprises.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling, and encoding all go through the `image` crate, with
//! `rav1e` behind its AVIF encoder. No system libraries are required.

pub mod compress;
pub mod config;
pub mod imaging;
pub mod output;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
