//! Deterministic cleanup of raw engine text.
//!
//! Generative OCR models occasionally wrap their answer in a ```` ```markdown ````
//! fence, emit `\r\n` line endings, pad lines with spaces, or leak zero-width
//! characters from their tokenizer. None of that is page content. The rules
//! here only touch those artefacts; recognised text is never rewritten.
//!
//! Rule order matters: line endings are normalised before fences are
//! stripped, so the fence pattern only has to match `\n`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to raw engine output.
///
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip an outer markdown fence
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of 3+ blank lines down to 2
/// 5. Strip invisible Unicode (ZWSP, BOM, soft hyphen, ZWNJ, ZWJ, word joiner)
/// 6. Trim leading/trailing blank lines
pub fn clean_engine_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*?)\n?```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

/// Zero-width space, BOM, soft hyphen, ZWNJ, ZWJ, word joiner.
const INVISIBLE: [char; 6] = ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}
