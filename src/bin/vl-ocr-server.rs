//! CLI binary for vl-ocr-server.
//!
//! `serve` maps flags / environment variables onto `ServiceConfig` and runs
//! the HTTP server. `probe` is a small smoke-test client for a running
//! instance.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vl_ocr_server::{serve, OcrEngine, ServiceConfig, VlmOcrEngine};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve with an Ollama-hosted vision model
  vl-ocr-server serve --provider ollama --model-id llava

  # Serve on another port, keep blank-page detection stricter
  PORT=9000 MIN_INFORMATIVE_TILES=10 vl-ocr-server serve

  # Smoke-test a running instance
  vl-ocr-server probe --url http://localhost:8080 --pdf sample.pdf

ENDPOINTS:
  GET  /health               engine status
  GET  /                     service metadata
  POST /ocr                  multipart upload (field `file`, optional `skip_blank`)
  POST /v1/chat/completions  OpenAI-style; last message = data:application/pdf;base64,...

ENVIRONMENT VARIABLES:
  HOST, PORT                 Listen address (default 0.0.0.0:8080)
  PDF_DPI                    Rendering DPI (default 200)
  MAX_IMAGE_DIMENSION        Longest image edge sent to the engine (default 2048)
  TILE_SIZE                  Classifier tile side in px (default 64)
  VARIANCE_THRESHOLD         Informative-tile variance threshold (default 100.0)
  MIN_INFORMATIVE_TILES      Tiles needed for a page to count as content (default 5)
  MODEL_ID                   Model served by the engine
  MAX_NEW_TOKENS             Generation limit per page (default 2048)
  OCR_PROVIDER               openai, anthropic, gemini, ollama, ... (auto-detected if unset)
  OCR_CONCURRENCY            Engine calls in flight per request (default 1)
  MAX_UPLOAD_BYTES           Request body limit (default 64 MiB)
  PDFIUM_LIB_PATH            Directory or file of the pdfium shared library
  RUST_LOG                   Log filter (default info)

A `.env` file in the working directory is loaded before flags are parsed.
"#;

/// PDF OCR over HTTP with blank-page skipping.
#[derive(Parser, Debug)]
#[command(
    name = "vl-ocr-server",
    version,
    about = "PDF OCR over HTTP: skip blank pages, OCR the rest with a vision-language model",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Check a running server: /health, then /ocr and chat with a sample PDF.
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Longest edge, in pixels, of a page image handed to the engine.
    #[arg(long, env = "MAX_IMAGE_DIMENSION", default_value_t = 2048)]
    max_dimension: u32,

    /// Classifier tile side in pixels.
    #[arg(long, env = "TILE_SIZE", default_value_t = 64)]
    tile_size: u32,

    /// Tiles with luminance variance above this are informative.
    #[arg(long, env = "VARIANCE_THRESHOLD", default_value_t = 100.0)]
    variance_threshold: f64,

    /// Informative tiles needed for a page to have content.
    #[arg(long, env = "MIN_INFORMATIVE_TILES", default_value_t = 5)]
    min_informative_tiles: usize,

    #[arg(long, env = "MODEL_ID", default_value = vl_ocr_server::config::DEFAULT_MODEL_ID)]
    model_id: String,

    #[arg(long, env = "MAX_NEW_TOKENS", default_value_t = 2048)]
    max_new_tokens: usize,

    /// Vision provider. Auto-detected from API key variables if not set.
    #[arg(long, env = "OCR_PROVIDER")]
    provider: Option<String>,

    /// Engine calls in flight per request.
    #[arg(long, env = "OCR_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Retries per page on engine failure.
    #[arg(long, env = "OCR_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 64 * 1024 * 1024)]
    max_upload_bytes: usize,

    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Base URL of the server.
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// PDF to send to /ocr and /v1/chat/completions.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 300)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Probe(args) => run_probe(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut builder = ServiceConfig::builder()
        .host(args.host)
        .port(args.port)
        .dpi(args.dpi)
        .max_dimension(args.max_dimension)
        .tile_size(args.tile_size)
        .variance_threshold(args.variance_threshold)
        .min_informative_tiles(args.min_informative_tiles)
        .model_id(args.model_id)
        .max_new_tokens(args.max_new_tokens)
        .ocr_concurrency(args.concurrency)
        .max_retries(args.max_retries)
        .max_upload_bytes(args.max_upload_bytes);
    if let Some(path) = args.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path);
    }
    let config = builder.build().context("Invalid configuration")?;

    // Start without an engine rather than refusing to boot: /health then
    // reports model_loaded=false and OCR routes answer 503.
    let engine: Option<Arc<dyn OcrEngine>> =
        match VlmOcrEngine::from_provider_name(args.provider.as_deref(), &config) {
            Ok(engine) => Some(Arc::new(engine)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

    serve(config, engine).await.context("Server failed")
}

async fn run_probe(args: ProbeArgs) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .context("Failed to build HTTP client")?;
    let base = args.url.trim_end_matches('/');
    let mut failures = 0usize;

    // ── /health ──────────────────────────────────────────────────────────
    println!("{}", bold("Health check"));
    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .with_context(|| format!("Cannot reach {base}"))?
        .json()
        .await
        .context("Invalid /health response")?;
    println!("  {}", serde_json::to_string_pretty(&health)?);
    if health["model_loaded"].as_bool() == Some(true) {
        println!("  {}", green("model loaded"));
    } else {
        println!("  {}", red("model not loaded"));
        failures += 1;
    }

    let Some(pdf_path) = args.pdf else {
        return finish(failures);
    };
    let pdf_bytes = tokio::fs::read(&pdf_path)
        .await
        .with_context(|| format!("Failed to read {}", pdf_path.display()))?;
    let filename = pdf_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    // ── /ocr ─────────────────────────────────────────────────────────────
    println!("\n{}", bold("Direct OCR"));
    let part = reqwest::multipart::Part::bytes(pdf_bytes.clone())
        .file_name(filename)
        .mime_str("application/pdf")?;
    let form = reqwest::multipart::Form::new().part("file", part);
    let resp = client
        .post(format!("{base}/ocr"))
        .multipart(form)
        .send()
        .await
        .context("/ocr request failed")?;
    let status = resp.status();
    let body: Value = resp.json().await.context("Invalid /ocr response")?;
    if status.is_success() {
        println!(
            "  {} pages total, {} processed, {} skipped {}",
            body["pages_total"], body["pages_processed"], body["pages_skipped"], body["skipped_pages"]
        );
        println!("  {} characters", body["total_chars"]);
        print_preview(body["markdown"].as_str().unwrap_or(""));
    } else {
        println!("  {} {}: {}", red("FAILED"), status, body["detail"]);
        failures += 1;
    }

    // ── /v1/chat/completions ─────────────────────────────────────────────
    println!("\n{}", bold("Chat completions"));
    let request = serde_json::json!({
        "model": "paddleocr-vl",
        "messages": [{
            "role": "user",
            "content": format!("data:application/pdf;base64,{}", STANDARD.encode(&pdf_bytes)),
        }],
    });
    let resp = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&request)
        .send()
        .await
        .context("chat request failed")?;
    let status = resp.status();
    let body: Value = resp.json().await.context("Invalid chat response")?;
    if status.is_success() {
        println!("  usage: {}", body["usage"]);
        print_preview(body["choices"][0]["message"]["content"].as_str().unwrap_or(""));
    } else {
        println!("  {} {}: {}", red("FAILED"), status, body["detail"]);
        failures += 1;
    }

    finish(failures)
}

fn print_preview(markdown: &str) {
    let preview: String = markdown.chars().take(500).collect();
    println!("  ── first 500 characters ──\n{preview}");
}

fn finish(failures: usize) -> Result<()> {
    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    println!("\n{}", green("All checks passed"));
    Ok(())
}
