//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Factor applied to the scale at every dimension-search step.
pub const SHRINK_FACTOR: f64 = 0.8;

/// Width divided by height.
pub fn aspect_ratio(source: (u32, u32)) -> f64 {
    let (w, h) = source;
    w.max(1) as f64 / h.max(1) as f64
}

/// Longer edge of a dimension pair.
pub fn longest_edge(dims: (u32, u32)) -> u32 {
    dims.0.max(dims.1)
}

/// Scale factor that fits `source` inside `bounds`.
///
/// Returns `1.0` when the source already fits; images are never upscaled.
pub fn initial_scale(source: (u32, u32), bounds: (u32, u32)) -> f64 {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    if src_w <= max_w && src_h <= max_h {
        return 1.0;
    }

    let ratio_w = max_w as f64 / src_w as f64;
    let ratio_h = max_h as f64 / src_h as f64;
    ratio_w.min(ratio_h)
}

/// Source dimensions multiplied by `scale`, rounded, each axis at least 1px.
pub fn scaled_dimensions(source: (u32, u32), scale: f64) -> (u32, u32) {
    let (src_w, src_h) = source;
    let w = (src_w as f64 * scale).round().max(1.0) as u32;
    let h = (src_h as f64 * scale).round().max(1.0) as u32;
    (w, h)
}

/// Calculate the initial target dimensions for a source inside a bounding box.
///
/// # Examples
/// ```
/// # use snug::imaging::plan_initial_dimensions;
/// // 4000x2000 into 1200x1200 → 1200x600
/// assert_eq!(plan_initial_dimensions((4000, 2000), (1200, 1200)), (1200, 600));
///
/// // Already fits → unchanged
/// assert_eq!(plan_initial_dimensions((300, 300), (1200, 1200)), (300, 300));
/// ```
pub fn plan_initial_dimensions(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    scaled_dimensions(source, initial_scale(source, bounds))
}

/// Dimensions with the longer edge pinned to `min_dimension`.
///
/// The shorter edge is recomputed from the source aspect ratio.
/// Landscape and square sources pin the width, portrait sources the height.
pub fn floor_dimensions(aspect: f64, min_dimension: u32) -> (u32, u32) {
    let floor = min_dimension as f64;
    if aspect >= 1.0 {
        let h = (floor / aspect).round().max(1.0) as u32;
        (min_dimension, h)
    } else {
        let w = (floor * aspect).round().max(1.0) as u32;
        (w, min_dimension)
    }
}

/// Dimensions for the final budget-agnostic encode.
///
/// The floor dimensions, unless either axis would exceed the last tried
/// dimensions (a source below the floor is never upscaled).
pub fn fallback_dimensions(aspect: f64, min_dimension: u32, last: (u32, u32)) -> (u32, u32) {
    let floor = floor_dimensions(aspect, min_dimension);
    if floor.0 > last.0 || floor.1 > last.1 {
        last
    } else {
        floor
    }
}

/// One shrink step: both edges multiplied by [`SHRINK_FACTOR`] and rounded.
///
/// Each axis stays at least 1px.
pub fn shrink_dimensions(dims: (u32, u32)) -> (u32, u32) {
    let (w, h) = dims;
    let w = (w as f64 * SHRINK_FACTOR).round().max(1.0) as u32;
    let h = (h as f64 * SHRINK_FACTOR).round().max(1.0) as u32;
    (w, h)
}

/// Upper bound on dimension-search iterations for a given longer edge.
///
/// `⌈log(longest / min_dimension) / log(1 / SHRINK_FACTOR)⌉ + 1`, or zero
/// when the image is already at or below the floor.
pub fn max_shrink_iterations(longest: u32, min_dimension: u32) -> usize {
    if longest <= min_dimension {
        return 0;
    }
    let steps = (longest as f64 / min_dimension.max(1) as f64).ln() / (1.0 / SHRINK_FACTOR).ln();
    steps.ceil() as usize + 1
}

/// Successive dimension levels tried by the dimension search.
///
/// Each step shrinks the previous level with [`shrink_dimensions`]. When a
/// step lands below the floor, or rounding fails to shrink the longer edge,
/// the level is replaced by [`floor_dimensions`] for the source aspect ratio.
/// The ladder ends once the longer edge is at or below `min_dimension`.
#[derive(Debug, Clone)]
pub struct DimensionLadder {
    aspect: f64,
    current: (u32, u32),
    min_dimension: u32,
}

impl DimensionLadder {
    /// Start below `start` (the level already tried) for a `source` image.
    pub fn new(source: (u32, u32), start: (u32, u32), min_dimension: u32) -> Self {
        Self {
            aspect: aspect_ratio(source),
            current: start,
            min_dimension,
        }
    }

    /// The most recently produced level (or the starting level).
    pub fn current(&self) -> (u32, u32) {
        self.current
    }
}

impl Iterator for DimensionLadder {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<(u32, u32)> {
        if longest_edge(self.current) <= self.min_dimension {
            return None;
        }

        let mut next = shrink_dimensions(self.current);
        let next_longest = longest_edge(next);
        if next_longest < self.min_dimension || next_longest >= longest_edge(self.current) {
            next = floor_dimensions(self.aspect, self.min_dimension);
        }

        self.current = next;
        Some(next)
    }
}
