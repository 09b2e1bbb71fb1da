//! Task prompts sent to the vision-language model.
//!
//! PaddleOCR-VL style models are trained on a short task prefix rather than a
//! long instruction prompt, so each task maps to exactly one fixed string.
//! Keeping them here lets tests pin them without a live model.

/// Plain text recognition. The only task the HTTP endpoints use.
pub const OCR_PROMPT: &str = "OCR:";

/// Table recognition.
pub const TABLE_PROMPT: &str = "Table Recognition:";

/// Mathematical formula recognition.
pub const FORMULA_PROMPT: &str = "Formula Recognition:";

/// Chart recognition.
pub const CHART_PROMPT: &str = "Chart Recognition:";
