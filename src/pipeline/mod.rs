//! Page pipeline: PDF bytes → filtered, engine-ready page images.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! is testable on its own and the pdfium-dependent part stays isolated.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ classify ──▶ (drop blank) ──▶ normalize ──▶ [engine] ──▶ assemble
//! (pdfium)   (tile var)                    (lanczos)                 (markdown)
//! ```
//!
//! 1. [`render`]    — rasterise every page at `dpi / 72` scale, all-or-nothing
//! 2. [`classify`]  — tile-variance content test, one [`PageStatistics`] per page
//! 3. [`normalize`] — bound the longest edge for model input
//! 4. [`encode`]    — PNG + base64 for engines that take images over the wire
//! 5. [`assemble`]  — join per-page OCR text with separators and page markers
//!
//! Rendering, classification and normalisation are CPU-bound and run together
//! inside one `spawn_blocking` task per request. No state is shared between
//! requests.

pub mod assemble;
pub mod classify;
pub mod encode;
pub mod normalize;
pub mod render;

pub use classify::PageStatistics;

use crate::config::{ClassificationThresholds, ServiceConfig};
use crate::error::DocumentError;
use image::RgbImage;
use std::path::PathBuf;
use tracing::info;

/// One rendered page: an RGB raster plus its 1-indexed source page number.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_number: usize,
    pub image: RgbImage,
}

impl PageImage {
    pub fn new(page_number: usize, image: RgbImage) -> Self {
        Self { page_number, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Per-request pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Classify pages and drop the blank ones.
    pub skip_blank: bool,
    pub dpi: u32,
    pub thresholds: ClassificationThresholds,
    /// Longest edge of a retained image.
    pub max_dimension: u32,
    pub pdfium_lib_path: Option<PathBuf>,
}

impl PipelineOptions {
    pub fn from_config(config: &ServiceConfig, skip_blank: bool) -> Self {
        Self {
            skip_blank,
            dpi: config.dpi,
            thresholds: config.thresholds,
            max_dimension: config.max_dimension,
            pdfium_lib_path: config.pdfium_lib_path.clone(),
        }
    }
}

/// Output of the page pipeline.
///
/// `processed_images[i].page_number == processed_page_numbers[i]`, page
/// numbers strictly increase, and when `all_stats` is non-empty every
/// processed page appears there with `has_content == true`.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    /// Pages in the source document, whether or not they were classified.
    pub total_pages: usize,
    pub processed_images: Vec<PageImage>,
    pub processed_page_numbers: Vec<usize>,
    /// One entry per source page when classification ran, otherwise empty.
    pub all_stats: Vec<PageStatistics>,
}

impl PipelineResult {
    /// Whether blank-page classification ran for this document.
    pub fn classified(&self) -> bool {
        !self.all_stats.is_empty()
    }

    /// Source page numbers the classifier rejected, in order.
    pub fn skipped_page_numbers(&self) -> Vec<usize> {
        self.all_stats
            .iter()
            .filter(|s| !s.has_content)
            .map(|s| s.page_number)
            .collect()
    }

    pub fn pages_processed(&self) -> usize {
        self.processed_images.len()
    }

    pub fn pages_skipped(&self) -> usize {
        self.total_pages.saturating_sub(self.processed_images.len())
    }
}

/// Classify, filter and normalise already-rendered pages.
///
/// With `skip_blank == false` every page is kept and no statistics are
/// produced. Otherwise every page is classified, its statistics recorded, and
/// only pages with content are kept. Kept pages are always passed through
/// [`normalize::normalize`].
pub fn filter_pages(
    pages: Vec<PageImage>,
    skip_blank: bool,
    thresholds: &ClassificationThresholds,
    max_dimension: u32,
) -> PipelineResult {
    let total_pages = pages.len();
    let mut result = PipelineResult {
        total_pages,
        processed_images: Vec::with_capacity(total_pages),
        processed_page_numbers: Vec::with_capacity(total_pages),
        all_stats: Vec::with_capacity(if skip_blank { total_pages } else { 0 }),
    };

    for page in pages {
        if skip_blank {
            let (has_content, stats) = classify::classify(&page, thresholds);
            result.all_stats.push(stats);
            if !has_content {
                info!("Page {} skipped (blank/uniform)", page.page_number);
                continue;
            }
        }
        let page = normalize::normalize(page, max_dimension);
        result.processed_page_numbers.push(page.page_number);
        result.processed_images.push(page);
    }

    info!(
        "Processed {}/{} pages (skipped {})",
        result.pages_processed(),
        total_pages,
        result.pages_skipped()
    );
    result
}

/// Blocking pipeline body: bind pdfium, render, then [`filter_pages`].
pub fn process_document_blocking(
    pdf_bytes: &[u8],
    options: &PipelineOptions,
) -> Result<PipelineResult, DocumentError> {
    let pdfium = render::bind_pdfium(options.pdfium_lib_path.as_deref())?;
    let pages = render::render_document(&pdfium, pdf_bytes, options.dpi)?;
    Ok(filter_pages(
        pages,
        options.skip_blank,
        &options.thresholds,
        options.max_dimension,
    ))
}

/// Run the page pipeline on a blocking-pool thread.
pub async fn process_document(
    pdf_bytes: Vec<u8>,
    options: PipelineOptions,
) -> Result<PipelineResult, DocumentError> {
    tokio::task::spawn_blocking(move || process_document_blocking(&pdf_bytes, &options))
        .await
        .map_err(|e| DocumentError::TaskFailed(e.to_string()))?
}
