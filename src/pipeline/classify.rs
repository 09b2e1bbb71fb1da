//! Blank-page detection by tile-based local variance.
//!
//! Average brightness is a poor content signal: a scanned blank sheet with a
//! grey cast and a page holding a single line of text have nearly the same
//! mean. Local variance is not fooled. The luminance grid is cut into square
//! tiles; uniform regions (white paper, black bars, any solid colour, faint
//! scanner noise) produce near-zero variance, while glyph edges, rules and
//! photographs push a tile well above the threshold. A page carries content
//! once enough tiles are informative.

use crate::config::ClassificationThresholds;
use crate::pipeline::PageImage;
use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Diagnostic record for one analysed page.
///
/// Only `informative_tiles` drives the decision; the global figures are for
/// monitoring and threshold tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStatistics {
    /// 1-indexed page number in the source document.
    pub page_number: usize,
    pub has_content: bool,
    pub mean_brightness: f64,
    pub global_variance: f64,
    pub total_tiles: usize,
    pub informative_tiles: usize,
    /// `informative_tiles / total_tiles`, or 0 when there are no tiles.
    pub informative_ratio: f64,
    pub max_tile_variance: f64,
    pub median_tile_variance: f64,
}

/// Convert RGB to single-channel luminance (ITU-R BT.601 weights).
///
/// Fixed-point with rounding: `(19595 R + 38470 G + 7471 B + 2^15) >> 16`.
pub fn to_luminance(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (dst, src) in gray.pixels_mut().zip(image.pixels()) {
        let [r, g, b] = src.0;
        let l = (19595 * r as u32 + 38470 * g as u32 + 7471 * b as u32 + 0x8000) >> 16;
        *dst = Luma([l as u8]);
    }
    gray
}

/// Running sums for a population variance over 8-bit samples.
#[derive(Default, Clone, Copy)]
struct Moments {
    n: u64,
    sum: u64,
    sum_sq: u64,
}

impl Moments {
    fn push(&mut self, v: u8) {
        let v = v as u64;
        self.n += 1;
        self.sum += v;
        self.sum_sq += v * v;
    }

    fn mean(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum as f64 / self.n as f64
    }

    /// `(n·Σx² − (Σx)²) / n²`, computed exactly in integers first.
    fn variance(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = self.n as u128;
        let num = n * self.sum_sq as u128 - (self.sum as u128) * (self.sum as u128);
        num as f64 / (n * n) as f64
    }
}

/// Population variance of every full `tile_size` × `tile_size` tile, row-major.
///
/// Partial tiles along the right and bottom edges are dropped, so the result
/// has exactly `floor(W/T) * floor(H/T)` entries.
pub fn tile_variances(gray: &GrayImage, tile_size: u32) -> Vec<f64> {
    if tile_size == 0 {
        return Vec::new();
    }
    let (width, height) = gray.dimensions();
    let cols = width / tile_size;
    let rows = height / tile_size;
    let raw = gray.as_raw();
    let stride = width as usize;
    let t = tile_size as usize;

    let mut variances = Vec::with_capacity((cols * rows) as usize);
    for ty in 0..rows as usize {
        for tx in 0..cols as usize {
            let mut m = Moments::default();
            for y in ty * t..(ty + 1) * t {
                let start = y * stride + tx * t;
                for &v in &raw[start..start + t] {
                    m.push(v);
                }
            }
            variances.push(m.variance());
        }
    }
    variances
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Decide whether `page` carries meaningful content.
///
/// A page smaller than one tile in either dimension yields zero tiles and is
/// reported as blank rather than failing.
pub fn classify(page: &PageImage, thresholds: &ClassificationThresholds) -> (bool, PageStatistics) {
    let gray = to_luminance(&page.image);

    let mut global = Moments::default();
    for p in gray.pixels() {
        global.push(p.0[0]);
    }

    let variances = tile_variances(&gray, thresholds.tile_size);
    let total_tiles = variances.len();
    let informative_tiles = variances
        .iter()
        .filter(|&&v| v > thresholds.variance_threshold)
        .count();

    if total_tiles == 0 {
        warn!(
            "Page {}: {}x{} px is smaller than one {}px tile; treating as blank",
            page.page_number,
            page.width(),
            page.height(),
            thresholds.tile_size
        );
    }

    let informative_ratio = if total_tiles > 0 {
        informative_tiles as f64 / total_tiles as f64
    } else {
        0.0
    };
    let has_content = total_tiles > 0 && informative_tiles >= thresholds.min_informative_tiles;

    let stats = PageStatistics {
        page_number: page.page_number,
        has_content,
        mean_brightness: global.mean(),
        global_variance: global.variance(),
        total_tiles,
        informative_tiles,
        informative_ratio,
        max_tile_variance: variances.iter().copied().fold(0.0, f64::max),
        median_tile_variance: median(&variances),
    };

    if has_content {
        debug!(
            "Page {}: content, {}/{} informative tiles ({:.1}%), var_max={:.1}",
            page.page_number,
            informative_tiles,
            total_tiles,
            informative_ratio * 100.0,
            stats.max_tile_variance
        );
    } else {
        debug!(
            "Page {}: blank/uniform, {}/{} informative tiles ({:.1}%), brightness={:.1}",
            page.page_number,
            informative_tiles,
            total_tiles,
            informative_ratio * 100.0,
            stats.mean_brightness
        );
    }

    (has_content, stats)
}
