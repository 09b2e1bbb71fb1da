//! OCR engine capability.
//!
//! The service never owns a model itself: it is handed an [`OcrEngine`] at
//! startup (or none, in which case OCR endpoints answer 503 while `/health`
//! reports `model_loaded: false`). Keeping the engine behind a trait lets the
//! HTTP layer and the orchestrator be tested with a scripted engine.

pub mod cleanup;
pub mod vlm;

pub use vlm::VlmOcrEngine;

use crate::error::EngineError;
use crate::prompts::{CHART_PROMPT, FORMULA_PROMPT, OCR_PROMPT, TABLE_PROMPT};
use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the engine should extract from an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrTask {
    Ocr,
    Table,
    Formula,
    Chart,
}

impl OcrTask {
    /// Prompt prefix the model expects for this task.
    pub fn prompt(self) -> &'static str {
        match self {
            OcrTask::Ocr => OCR_PROMPT,
            OcrTask::Table => TABLE_PROMPT,
            OcrTask::Formula => FORMULA_PROMPT,
            OcrTask::Chart => CHART_PROMPT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OcrTask::Ocr => "ocr",
            OcrTask::Table => "table",
            OcrTask::Formula => "formula",
            OcrTask::Chart => "chart",
        }
    }
}

impl fmt::Display for OcrTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ocr" => Ok(OcrTask::Ocr),
            "table" => Ok(OcrTask::Table),
            "formula" => Ok(OcrTask::Formula),
            "chart" => Ok(OcrTask::Chart),
            other => Err(format!(
                "unknown task '{other}' (expected ocr, table, formula or chart)"
            )),
        }
    }
}

/// Text extracted from one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub text: String,
    /// Prompt tokens consumed, when the backend reports them.
    pub prompt_tokens: Option<u32>,
}

impl EngineOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: None,
        }
    }
}

/// Lifecycle state surfaced by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHealth {
    pub model_loaded: bool,
    /// Where inference runs: "cuda", "cpu", "remote", ...
    pub device: String,
    pub cuda_available: bool,
}

/// A backend that turns one page image into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    fn health(&self) -> EngineHealth;

    /// How many [`run`](OcrEngine::run) calls may be in flight at once.
    ///
    /// Engines wrapping a single non-reentrant model keep the default of 1.
    fn max_concurrency(&self) -> usize {
        1
    }

    /// Recognise `image` for the given task.
    async fn run(&self, image: &RgbImage, task: OcrTask) -> Result<EngineOutput, EngineError>;
}
