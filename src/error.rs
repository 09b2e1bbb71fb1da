//! Error types for the vl-ocr-server library.
//!
//! Failures fall into a small, closed taxonomy:
//!
//! * [`DocumentError`] — the uploaded bytes are not a renderable PDF, or one
//!   page failed to rasterise. Rendering is all-or-nothing.
//! * [`RequestShapeError`] — the request itself is malformed (wrong data-URI
//!   scheme, undecodable base64, no messages, non-PDF upload).
//! * [`EngineError`] — the external OCR engine failed on a page.
//! * [`ServiceError`] — the umbrella the orchestrator returns. It is the only
//!   type that crosses into the HTTP layer, and [`ServiceError::status_code`]
//!   is the single place where an error kind becomes a status code.
//!
//! A page too small to hold one classification tile is *not* an error: the
//! classifier reports it as "no content" and the pipeline moves on.

use axum::http::StatusCode;
use thiserror::Error;

/// The PDF could not be turned into page images.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// pdfium rejected the byte stream (bad header, truncated xref, ...).
    #[error("Unable to process PDF: {detail}")]
    Unreadable { detail: String },

    /// The document parsed but contains no pages.
    #[error("Unable to process PDF: document has no pages")]
    NoPages,

    /// pdfium failed on one specific page.
    #[error("Unable to process PDF: rasterisation failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// No pdfium shared library could be bound. Not a property of the upload:
    /// [`ServiceError`] files it under [`ServiceError::RendererUnavailable`].
    #[error("PDF engine unavailable: {0}\nSet PDFIUM_LIB_PATH to a directory containing libpdfium.")]
    PdfiumUnavailable(String),

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    TaskFailed(String),
}

/// The request did not have the shape the endpoint expects.
#[derive(Debug, Error)]
pub enum RequestShapeError {
    #[error("No messages provided")]
    NoMessages,

    /// Message content was not a plain string (e.g. an array of parts).
    #[error("Message content must be a string")]
    UnsupportedContent,

    #[error("Content must be a base64-encoded PDF (data:application/pdf;base64,...)")]
    NotPdfDataUri,

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Only PDF files are supported (got '{filename}')")]
    NotAPdfFilename { filename: String },

    #[error("Missing multipart field 'file'")]
    MissingFile,

    #[error("Failed to read upload: {0}")]
    Multipart(String),

    #[error("Invalid request body: {0}")]
    Body(String),
}

/// Failure reported by an OCR engine for a single image.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The model call failed (after any retries the engine performs).
    #[error("OCR error: {0}")]
    Inference(String),

    /// The engine could not be constructed (missing API key, unknown provider).
    #[error("OCR engine '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },

    /// The page image could not be encoded for the engine.
    #[error("Failed to encode page image: {0}")]
    Encode(String),
}

/// Anything the orchestrator can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Document(DocumentError),

    #[error(transparent)]
    Request(#[from] RequestShapeError),

    #[error("Page {page}: {source}")]
    Engine {
        page: usize,
        #[source]
        source: EngineError,
    },

    /// No OCR engine is loaded. Distinct from a per-call [`EngineError`].
    #[error("OCR engine is not ready")]
    EngineNotReady,

    /// pdfium could not be bound on this host. The cause (with the operator
    /// hint) is logged, never sent to the client.
    #[error("PDF renderer is unavailable")]
    RendererUnavailable(#[source] DocumentError),
}

impl From<DocumentError> for ServiceError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::PdfiumUnavailable(_) => ServiceError::RendererUnavailable(e),
            other => ServiceError::Document(other),
        }
    }
}

impl ServiceError {
    /// HTTP status for this error kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Request(_) => StatusCode::BAD_REQUEST,
            ServiceError::Document(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Engine { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::EngineNotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::RendererUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code for the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Request(_) => "invalid_request",
            ServiceError::Document(_) => "document_error",
            ServiceError::Engine { .. } => "engine_error",
            ServiceError::EngineNotReady => "engine_not_ready",
            ServiceError::RendererUnavailable(_) => "renderer_unavailable",
        }
    }
}

/// Builder validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_map_to_bad_request() {
        let e: ServiceError = RequestShapeError::NotPdfDataUri.into();
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.kind(), "invalid_request");
        assert!(e.to_string().contains("data:application/pdf;base64"));
    }

    #[test]
    fn document_errors_map_to_internal_error() {
        let e: ServiceError = DocumentError::Unreadable {
            detail: "Incorrect file length".into(),
        }
        .into();
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.to_string().contains("Incorrect file length"));
    }

    #[test]
    fn engine_error_carries_page() {
        let e = ServiceError::Engine {
            page: 3,
            source: EngineError::Inference("CUDA out of memory".into()),
        };
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let msg = e.to_string();
        assert!(msg.contains("Page 3"), "got: {msg}");
        assert!(msg.contains("CUDA out of memory"), "got: {msg}");
    }

    #[test]
    fn engine_not_ready_is_unavailable() {
        assert_eq!(
            ServiceError::EngineNotReady.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn missing_pdfium_is_not_blamed_on_the_document() {
        let e: ServiceError =
            DocumentError::PdfiumUnavailable("LoadLibraryError(\"libpdfium.so\")".into()).into();
        assert!(matches!(e, ServiceError::RendererUnavailable(_)));
        assert_eq!(e.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(e.kind(), "renderer_unavailable");
        let msg = e.to_string();
        assert!(!msg.contains("PDFIUM_LIB_PATH"), "got: {msg}");
        assert!(!msg.contains("libpdfium"), "got: {msg}");
    }

    #[test]
    fn other_document_errors_stay_document_errors() {
        let e: ServiceError = DocumentError::NoPages.into();
        assert_eq!(e.kind(), "document_error");
    }

    #[test]
    fn render_failure_display() {
        let e = DocumentError::RenderFailed {
            page: 7,
            detail: "PdfiumLibraryInternalError".into(),
        };
        assert!(e.to_string().contains("page 7"));
    }
}
