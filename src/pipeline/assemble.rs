//! Join per-page OCR text into one Markdown document.

use crate::output::OcrPageResult;

/// Inserted before every page block except the first.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Marker opening each page block. Numbers are 1-indexed positions in the
/// assembled sequence, not source page numbers: with page 2 skipped, source
/// page 3 is marked `<!-- Page 2 -->`.
pub fn page_marker(position: usize) -> String {
    format!("<!-- Page {} -->\n\n", position)
}

/// Assemble ordered page results into a single Markdown string.
///
/// Empty input yields an empty string; one page yields no separator.
pub fn assemble(results: &[OcrPageResult]) -> String {
    let mut markdown = String::with_capacity(results.iter().map(|r| r.text.len() + 32).sum());
    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            markdown.push_str(PAGE_SEPARATOR);
        }
        markdown.push_str(&page_marker(i + 1));
        markdown.push_str(result.text.trim());
    }
    markdown
}
