//! Configuration types for the OCR service.
//!
//! Every knob the pipeline and the HTTP layer read lives in [`ServiceConfig`],
//! built through [`ServiceConfigBuilder`]. The library never reads the
//! environment itself; the binary maps environment variables and flags onto
//! the builder.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default rendering resolution. 200–300 DPI is the useful range for OCR.
pub const DEFAULT_DPI: u32 = 200;
/// Default bound on the longest edge of an image handed to the engine.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;
/// Default model identifier reported by `GET /`.
pub const DEFAULT_MODEL_ID: &str = "PaddlePaddle/PaddleOCR-VL";

/// Tuning for the tile-variance blank-page classifier.
///
/// The same thresholds apply to every page of one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    /// Side of a square tile, in pixels. Must be non-zero.
    pub tile_size: u32,
    /// A tile is informative when its luminance variance is strictly above this.
    pub variance_threshold: f64,
    /// A page has content when at least this many tiles are informative.
    pub min_informative_tiles: usize,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            tile_size: 64,
            variance_threshold: 100.0,
            min_informative_tiles: 5,
        }
    }
}

impl ClassificationThresholds {
    /// Check the invariants the classifier relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "tile_size must be > 0".into(),
            ));
        }
        if !self.variance_threshold.is_finite() || self.variance_threshold < 0.0 {
            return Err(ConfigError::InvalidConfig(format!(
                "variance_threshold must be a finite value ≥ 0, got {}",
                self.variance_threshold
            )));
        }
        Ok(())
    }
}

/// Configuration for the OCR service.
///
/// # Example
/// ```rust
/// use vl_ocr_server::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .dpi(300)
///     .max_dimension(1600)
///     .tile_size(48)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address. Default: "0.0.0.0".
    pub host: String,

    /// Listen port. Default: 8080.
    pub port: u16,

    /// Rendering DPI. Range: 72–600. Default: 200.
    ///
    /// The render scale is `dpi / 72`. Higher DPI sharpens small print but
    /// grows every page quadratically in memory.
    pub dpi: u32,

    /// Longest edge, in pixels, of an image handed to the OCR engine. Default: 2048.
    pub max_dimension: u32,

    /// Blank-page classifier tuning.
    pub thresholds: ClassificationThresholds,

    /// Model identifier advertised by the service. Default: PaddleOCR-VL.
    pub model_id: String,

    /// Maximum tokens the engine may generate per page. Default: 2048.
    pub max_new_tokens: usize,

    /// Maximum OCR calls in flight for one request. Default: 1.
    ///
    /// The effective value is capped by what the engine reports it supports.
    pub ocr_concurrency: usize,

    /// Engine retries per page on a failed call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Maximum accepted request body. Default: 64 MiB.
    ///
    /// Base64 inflates a PDF by a third, so the chat endpoint accepts
    /// correspondingly smaller documents than `/ocr`.
    pub max_upload_bytes: usize,

    /// Directory (or file) of the pdfium shared library. `None` uses the
    /// system library search path.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            dpi: DEFAULT_DPI,
            max_dimension: DEFAULT_MAX_DIMENSION,
            thresholds: ClassificationThresholds::default(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_new_tokens: 2048,
            ocr_concurrency: 1,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_upload_bytes: 64 * 1024 * 1024,
            pdfium_lib_path: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn thresholds(mut self, thresholds: ClassificationThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn tile_size(mut self, px: u32) -> Self {
        self.config.thresholds.tile_size = px;
        self
    }

    pub fn variance_threshold(mut self, v: f64) -> Self {
        self.config.thresholds.variance_threshold = v;
        self
    }

    pub fn min_informative_tiles(mut self, n: usize) -> Self {
        self.config.thresholds.min_informative_tiles = n;
        self
    }

    pub fn model_id(mut self, id: impl Into<String>) -> Self {
        self.config.model_id = id.into();
        self
    }

    pub fn max_new_tokens(mut self, n: usize) -> Self {
        self.config.max_new_tokens = n.max(1);
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConfigError> {
        let c = &self.config;
        c.thresholds.validate()?;
        if c.max_dimension == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_dimension must be > 0".into(),
            ));
        }
        if c.ocr_concurrency == 0 {
            return Err(ConfigError::InvalidConfig(
                "ocr_concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_upload_bytes must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}
