//! # vl-ocr-server
//!
//! An HTTP service that turns PDF documents into Markdown with a
//! vision-language OCR model (PaddleOCR-VL style).
//!
//! ## Why this crate?
//!
//! Scanned PDFs often carry separator sheets, empty backs of single-sided
//! scans and other blank pages. Sending those to a VLM costs seconds of
//! inference each and sometimes yields hallucinated text. This service
//! rasterises every page, drops blank ones with a cheap tile-variance test,
//! downsizes the rest to a model-friendly size, and only then runs OCR.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Render     rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 2. Classify   tile-variance blank-page test, per-page statistics
//!  ├─ 3. Normalize  bound the longest edge (Lanczos3)
//!  ├─ 4. OCR        one engine call per kept page, results in page order
//!  ├─ 5. Assemble   page markers + horizontal-rule separators
//!  └─ 6. Respond    direct JSON payload or OpenAI-style chat completion
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vl_ocr_server::{serve, OcrEngine, ServiceConfig, VlmOcrEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().port(8080).build()?;
//!     let engine: Arc<dyn OcrEngine> =
//!         Arc::new(VlmOcrEngine::from_provider_name(Some("ollama"), &config)?);
//!     serve(config, Some(engine)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vl-ocr-server` binary (clap + anyhow + tracing-subscriber + reqwest) |
//!
//! Disable `cli` when embedding the router in another service:
//! ```toml
//! vl-ocr-server = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrate;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClassificationThresholds, ServiceConfig, ServiceConfigBuilder};
pub use engine::{EngineHealth, EngineOutput, OcrEngine, OcrTask, VlmOcrEngine};
pub use error::{ConfigError, DocumentError, EngineError, RequestShapeError, ServiceError};
pub use output::{ChatCompletionRequest, ChatCompletionResponse, DirectOcrResponse, OcrPageResult};
pub use pipeline::{PageImage, PageStatistics, PipelineResult};
pub use server::{router, serve, AppState};
