//! Bound the longest edge of a page image before it reaches the OCR engine.
//!
//! Vision encoders cost memory and time roughly in proportion to pixel count,
//! and most have a native input size far below a 200-DPI render of a large
//! page. Downsampling here keeps inference predictable. Lanczos3 is used
//! because nearest/bilinear filters alias thin glyph strokes, which costs
//! more recognition accuracy than the resize saves.

use crate::pipeline::PageImage;
use image::imageops::{self, FilterType};
use tracing::debug;

/// Target dimensions for an image of `width × height` bounded by `max_dimension`.
///
/// The longer side becomes exactly `max_dimension`; the shorter side is scaled
/// by the same factor and rounded to the nearest pixel (never below 1).
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let shrink = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    if width >= height {
        (max_dimension, shrink(height))
    } else {
        (shrink(width), max_dimension)
    }
}

/// Downsample `page` so neither side exceeds `max_dimension`.
///
/// Images already within the bound are returned untouched.
pub fn normalize(page: PageImage, max_dimension: u32) -> PageImage {
    let (width, height) = page.image.dimensions();
    let (new_width, new_height) = fit_within(width, height, max_dimension);
    if (new_width, new_height) == (width, height) {
        return page;
    }

    let resized = imageops::resize(&page.image, new_width, new_height, FilterType::Lanczos3);
    debug!(
        "Page {} resized: {}x{} → {}x{}",
        page.page_number, width, height, new_width, new_height
    );
    PageImage::new(page.page_number, resized)
}
