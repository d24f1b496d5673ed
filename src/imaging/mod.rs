//! Image processing — pure Rust, on the `image` crate.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Sniff + decode** | `image::guess_format`, `ImageReader` |
//! | **Surface** | `resize_exact` + `imageops::overlay` on opaque white |
//! | **Encode** | `JpegEncoder` / `PngEncoder` / `AvifEncoder` |
//! | **Search** | quality ladder, dimension ladder, fallback |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a single encode
//! - **Backend**: [`SurfaceEncoder`] trait + [`RustSurface`]
//! - **Search**: The two-phase search and fallback, generic over the backend

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;
pub mod search;

pub use backend::{BackendError, Dimensions, SurfaceEncoder};
pub use calculations::{
    DimensionLadder, SHRINK_FACTOR, aspect_ratio, fallback_dimensions, floor_dimensions,
    max_shrink_iterations, plan_initial_dimensions, shrink_dimensions,
};
pub use params::{EncodeParams, LossyFormat, OutputFormat, Quality, Resample};
pub use rust_backend::{RustSurface, header_dimensions, mime_for_path};
pub use search::{Encoded, fallback_encode, quality_ladder, run_search, search_dimensions, search_quality};
