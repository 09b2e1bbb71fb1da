//! HTTP surface: axum router, shared state, and error → response mapping.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /health` | engine lifecycle state |
//! | `GET /` | service metadata and endpoint list |
//! | `POST /ocr` | multipart upload → [`DirectOcrResponse`] |
//! | `POST /v1/chat/completions` | OpenAI-style request → [`ChatCompletionResponse`] |
//!
//! Handlers only extract and validate transport-level input; everything else
//! is delegated to [`crate::orchestrate`].

use crate::config::ServiceConfig;
use crate::engine::OcrEngine;
use crate::error::{RequestShapeError, ServiceError};
use crate::orchestrate;
use crate::output::{
    ChatCompletionRequest, ChatCompletionResponse, DirectOcrResponse, Endpoints, HealthResponse,
    ServiceInfo,
};
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        Query, State,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Human-readable service name reported by `GET /`.
pub const SERVICE_NAME: &str = "PaddleOCR-VL API";

/// State shared by every handler.
///
/// `engine` is `None` until a model is available; OCR routes then answer 503.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub engine: Option<Arc<dyn OcrEngine>>,
}

impl AppState {
    pub fn new(config: ServiceConfig, engine: Option<Arc<dyn OcrEngine>>) -> Self {
        Self {
            config: Arc::new(config),
            engine,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ServiceError::RendererUnavailable(cause) = &self {
            error!("{} ({}): {}", status, self.kind(), cause);
        } else if status.is_server_error() {
            error!("{} ({}): {}", status, self.kind(), self);
        } else {
            debug!("{} ({}): {}", status, self.kind(), self);
        }
        let body = ErrorBody {
            error: self.kind(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/ocr", post(ocr_direct))
        .route("/v1/chat/completions", post(chat_completions))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let response = match &state.engine {
        Some(engine) => {
            let h = engine.health();
            HealthResponse {
                status: "healthy".to_string(),
                model_loaded: h.model_loaded,
                device: h.device,
                cuda_available: h.cuda_available,
            }
        }
        None => HealthResponse {
            status: "healthy".to_string(),
            model_loaded: false,
            device: "none".to_string(),
            cuda_available: false,
        },
    };
    Json(response)
}

async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.config.model_id.clone(),
        endpoints: Endpoints {
            chat_completions: "/v1/chat/completions".to_string(),
            ocr_direct: "/ocr".to_string(),
            health: "/health".to_string(),
        },
    })
}

#[derive(Debug, Deserialize)]
struct OcrQuery {
    skip_blank: Option<String>,
}

/// Parse a boolean flag the way form and query values are usually spelled.
fn parse_flag(value: &str) -> Result<bool, RequestShapeError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(RequestShapeError::InvalidParameter {
            name: "skip_blank",
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn is_pdf_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

async fn ocr_direct(
    State(state): State<AppState>,
    Query(query): Query<OcrQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DirectOcrResponse>, ServiceError> {
    let mut multipart = multipart.map_err(|e| RequestShapeError::Multipart(e.body_text()))?;

    let mut skip_blank = match query.skip_blank.as_deref() {
        Some(v) => parse_flag(v)?,
        None => true,
    };
    let mut pdf_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RequestShapeError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                if !is_pdf_filename(&filename) {
                    return Err(RequestShapeError::NotAPdfFilename { filename }.into());
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| RequestShapeError::Multipart(e.body_text()))?;
                debug!("Received '{}' ({} bytes)", filename, data.len());
                pdf_bytes = Some(data.to_vec());
            }
            "skip_blank" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| RequestShapeError::Multipart(e.body_text()))?;
                skip_blank = parse_flag(&value)?;
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let pdf_bytes = pdf_bytes.ok_or(RequestShapeError::MissingFile)?;
    let response = orchestrate::run_direct(&state, pdf_bytes, skip_blank).await?;
    Ok(Json(response))
}

async fn chat_completions(
    State(state): State<AppState>,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Json<ChatCompletionResponse>, ServiceError> {
    let Json(request) = body.map_err(|e| RequestShapeError::Body(e.body_text()))?;
    if request.stream {
        debug!("stream=true requested; responding with a single completion");
    }
    let response = orchestrate::run_chat(&state, request).await?;
    Ok(Json(response))
}

/// Bind `host:port` and serve until Ctrl+C / SIGTERM.
pub async fn serve(config: ServiceConfig, engine: Option<Arc<dyn OcrEngine>>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    if engine.is_none() {
        warn!("No OCR engine configured; OCR endpoints will answer 503");
    }
    let app = router(AppState::new(config, engine));

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}
