//! OCR engine backed by a remote vision-language model.
//!
//! Each page is PNG-encoded, attached to a single user message together with
//! the task prompt, and sent through an `edgequake-llm` provider. Decoding is
//! greedy (temperature 0) so the same page yields the same text.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from hosted APIs are transient and frequent under
//! concurrent load. Failed calls are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms base and 2 retries the
//! waits are 500 ms → 1 s. Only when every attempt fails does the page fail.

use crate::config::ServiceConfig;
use crate::engine::cleanup::clean_engine_text;
use crate::engine::{EngineHealth, EngineOutput, OcrEngine, OcrTask};
use crate::error::EngineError;
use crate::pipeline::encode::encode_page;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Wait before retry `attempt` (1-based): `base_ms * 2^(attempt-1)`,
/// saturating at `u64::MAX`.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor)
}

/// [`OcrEngine`] implementation that calls a vision LLM provider.
pub struct VlmOcrEngine {
    provider: Arc<dyn LLMProvider>,
    label: String,
    max_new_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    concurrency: usize,
}

impl VlmOcrEngine {
    /// Wrap an already-configured provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &ServiceConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            max_new_tokens: config.max_new_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            concurrency: config.ocr_concurrency.max(1),
        }
    }

    /// Build an engine for a named provider (`openai`, `ollama`, ...) serving
    /// `config.model_id`, or auto-detect a provider from API-key variables
    /// when `provider_name` is `None`.
    pub fn from_provider_name(
        provider_name: Option<&str>,
        config: &ServiceConfig,
    ) -> Result<Self, EngineError> {
        let (provider, label) = match provider_name {
            Some(name) => {
                let provider = ProviderFactory::create_llm_provider(name, &config.model_id)
                    .map_err(|e| EngineError::NotConfigured {
                        provider: name.to_string(),
                        hint: format!("{e}"),
                    })?;
                (provider, format!("{name}/{}", config.model_id))
            }
            None => {
                let (provider, _embedding) =
                    ProviderFactory::from_env().map_err(|e| EngineError::NotConfigured {
                        provider: "auto".to_string(),
                        hint: format!(
                            "No vision provider could be auto-detected from environment.\n\
                            Set OCR_PROVIDER or an API key such as OPENAI_API_KEY.\n\
                            Error: {e}"
                        ),
                    })?;
                (provider, "auto".to_string())
            }
        };
        info!("OCR engine ready: {}", label);
        Ok(Self::new(provider, label, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_new_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl OcrEngine for VlmOcrEngine {
    fn name(&self) -> &str {
        &self.label
    }

    fn health(&self) -> EngineHealth {
        EngineHealth {
            model_loaded: true,
            device: "remote".to_string(),
            cuda_available: false,
        }
    }

    fn max_concurrency(&self) -> usize {
        self.concurrency
    }

    async fn run(&self, image: &RgbImage, task: OcrTask) -> Result<EngineOutput, EngineError> {
        let start = Instant::now();
        let owned = image.clone();
        let image_data = tokio::task::spawn_blocking(move || encode_page(&owned))
            .await
            .map_err(|e| EngineError::Encode(e.to_string()))?
            .map_err(|e| EngineError::Encode(e.to_string()))?;

        let messages = vec![ChatMessage::user_with_images(task.prompt(), vec![image_data])];
        let options = self.options();

        let mut last_err: Option<String> = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{} task: retry {}/{} after {}ms",
                    task, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{} task: {} input tokens, {} output tokens, {:?}",
                        task,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let prompt_tokens = u32::try_from(response.prompt_tokens)
                        .ok()
                        .filter(|&n| n > 0);
                    return Ok(EngineOutput {
                        text: clean_engine_text(&response.content),
                        prompt_tokens,
                    });
                }
                Err(e) => {
                    let err_msg = format!("{e}");
                    warn!("{} task: attempt {} failed: {}", task, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(EngineError::Inference(format!(
            "{} (after {} attempts)",
            last_err.unwrap_or_else(|| "Unknown error".to_string()),
            self.max_retries + 1
        )))
    }
}
