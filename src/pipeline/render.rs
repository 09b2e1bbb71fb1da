//! PDF rasterisation: render every page of an in-memory PDF to an RGB image.
//!
//! ## Why blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. Everything here is synchronous; [`crate::pipeline::process_document`]
//! runs it inside `tokio::task::spawn_blocking` so the Tokio workers keep
//! serving other requests while a large document renders.
//!
//! ## Why scale by `dpi / 72`?
//!
//! PDF user space is measured in points (1/72 inch). Scaling each page by
//! `dpi / 72` yields exactly `dpi` pixels per inch regardless of page size.

use crate::error::DocumentError;
use crate::pipeline::PageImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// PDF native resolution in points per inch.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Bind the pdfium shared library.
///
/// With an explicit `library_path` only that location is tried (a directory is
/// resolved to the platform library name inside it). Otherwise the current
/// directory is tried first, then the system library search path.
pub fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, DocumentError> {
    let bindings = match library_path {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DocumentError::PdfiumUnavailable(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Render scale factor for a target resolution.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / PDF_POINTS_PER_INCH
}

/// Rasterise every page of `pdf_bytes` at `dpi`.
///
/// Pages come back in document order, numbered from 1, always as 8-bit RGB
/// whatever the source colourspace. Any failure (unparsable bytes, zero
/// pages, one page failing) discards the pages rendered so far.
pub fn render_document(
    pdfium: &Pdfium,
    pdf_bytes: &[u8],
    dpi: u32,
) -> Result<Vec<PageImage>, DocumentError> {
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| DocumentError::Unreadable {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(DocumentError::NoPages);
    }
    info!("PDF loaded: {} pages ({} bytes)", total_pages, pdf_bytes.len());

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale_for_dpi(dpi));

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let page_number = idx + 1;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DocumentError::RenderFailed {
                page: page_number,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image().into_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            page_number,
            image.width(),
            image.height()
        );

        images.push(PageImage::new(page_number, image));
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_matches_points_per_inch() {
        assert_eq!(scale_for_dpi(72), 1.0);
        assert!((scale_for_dpi(200) - 2.777_777_8).abs() < 1e-5);
        assert_eq!(scale_for_dpi(144), 2.0);
    }

    #[test]
    fn missing_library_path_is_reported() {
        let err = bind_pdfium(Some(Path::new("/definitely/not/here/libpdfium.so")))
            .err()
            .expect("binding a nonexistent library must fail");
        assert!(matches!(err, DocumentError::PdfiumUnavailable(_)));
    }
}
