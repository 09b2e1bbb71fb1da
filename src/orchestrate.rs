//! Response orchestration: PDF bytes → pipeline → OCR → protocol payload.
//!
//! This is the only layer that turns lower-level failures into
//! [`ServiceError`]. Rendering errors, malformed requests and engine failures
//! all surface here, typed, and the HTTP layer merely maps them to a status.
//!
//! ## OCR Dispatch
//!
//! Pages are recognised with a `buffered` stream: up to
//! `min(engine.max_concurrency(), config.ocr_concurrency)` calls are in flight,
//! and results are yielded in submission order, so the assembler always sees
//! pages in source order. The first engine error aborts the document; the
//! remaining in-flight futures are dropped with the stream.

use crate::engine::{OcrEngine, OcrTask};
use crate::error::{RequestShapeError, ServiceError};
use crate::output::{
    AssistantMessage, ChatCompletionRequest, ChatCompletionResponse, Choice, DirectOcrResponse,
    OcrPageResult, Usage,
};
use crate::pipeline::{self, assemble, PageImage, PipelineOptions, PipelineResult};
use crate::server::AppState;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Prefix a chat message must carry to be treated as a PDF.
pub const PDF_DATA_URI_PREFIX: &str = "data:application/pdf;base64,";

/// Prompt-token estimate per image when the engine reports no counts.
pub const PROMPT_TOKENS_PER_IMAGE: u64 = 100;

/// Run OCR on every processed page, in page order.
pub async fn recognize_pages(
    engine: &Arc<dyn OcrEngine>,
    pipeline: &PipelineResult,
    concurrency: usize,
) -> Result<Vec<OcrPageResult>, ServiceError> {
    let concurrency = concurrency.min(engine.max_concurrency()).max(1);
    let total = pipeline.processed_images.len();
    let start = Instant::now();
    debug!(
        "Dispatching {} page(s) to '{}' (concurrency {})",
        total,
        engine.name(),
        concurrency
    );

    // Collected up front: a lazy borrowing `map` inside `stream::iter` makes
    // the handler future non-`Send`.
    let calls: Vec<_> = pipeline
        .processed_images
        .iter()
        .map(|page| recognize_one(Arc::clone(engine), page))
        .collect();
    let results: Vec<OcrPageResult> = stream::iter(calls)
        .buffered(concurrency)
        .try_collect()
        .await?;

    info!("OCR complete: {} page(s) in {:?}", total, start.elapsed());
    Ok(results)
}

async fn recognize_one(
    engine: Arc<dyn OcrEngine>,
    page: &PageImage,
) -> Result<OcrPageResult, ServiceError> {
    let output = engine
        .run(&page.image, OcrTask::Ocr)
        .await
        .map_err(|source| ServiceError::Engine {
            page: page.page_number,
            source,
        })?;
    debug!("Page {}: {} chars", page.page_number, output.text.chars().count());
    Ok(OcrPageResult {
        page_number: page.page_number,
        text: output.text,
        prompt_tokens: output.prompt_tokens,
    })
}

/// Strip the PDF data-URI prefix and decode the base64 payload.
///
/// ASCII whitespace inside the payload is ignored, so line-wrapped output of
/// `base64 file.pdf` decodes as-is.
pub fn decode_pdf_data_uri(content: &str) -> Result<Vec<u8>, RequestShapeError> {
    let payload = content
        .strip_prefix(PDF_DATA_URI_PREFIX)
        .ok_or(RequestShapeError::NotPdfDataUri)?;
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| RequestShapeError::InvalidBase64(e.to_string()))
}

/// Check a chat request and extract the PDF bytes from its last message.
pub fn validate_chat_request(request: &ChatCompletionRequest) -> Result<Vec<u8>, RequestShapeError> {
    if !(0.0..=2.0).contains(&request.temperature) {
        return Err(RequestShapeError::InvalidParameter {
            name: "temperature",
            reason: format!("must be between 0 and 2, got {}", request.temperature),
        });
    }
    if request.max_tokens < 1 {
        return Err(RequestShapeError::InvalidParameter {
            name: "max_tokens",
            reason: "must be at least 1".to_string(),
        });
    }
    let last = request.messages.last().ok_or(RequestShapeError::NoMessages)?;
    let content = last
        .content
        .as_text()
        .ok_or(RequestShapeError::UnsupportedContent)?;
    decode_pdf_data_uri(content)
}

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Engine-reported prompt tokens when every page reported a count,
/// otherwise `100 × image count`.
pub fn prompt_token_count(results: &[OcrPageResult]) -> u64 {
    let reported: Option<u64> = results
        .iter()
        .map(|r| r.prompt_tokens.map(u64::from))
        .sum();
    match reported {
        Some(total) if !results.is_empty() => total,
        _ => PROMPT_TOKENS_PER_IMAGE * results.len() as u64,
    }
}

/// Build the `POST /ocr` payload.
pub fn build_direct_response(pipeline: &PipelineResult, markdown: String) -> DirectOcrResponse {
    DirectOcrResponse {
        success: true,
        pages_total: pipeline.total_pages,
        pages_processed: pipeline.pages_processed(),
        pages_skipped: pipeline.pages_skipped(),
        skipped_pages: pipeline.skipped_page_numbers(),
        processed_pages: pipeline.processed_page_numbers.clone(),
        total_chars: markdown.chars().count(),
        markdown,
        page_stats: pipeline
            .classified()
            .then(|| pipeline.all_stats.clone()),
    }
}

/// Build the `POST /v1/chat/completions` payload.
///
/// `created` is a Unix timestamp in seconds; it also forms the id.
pub fn build_chat_response(
    model: &str,
    results: &[OcrPageResult],
    markdown: String,
    created: i64,
) -> ChatCompletionResponse {
    let prompt_tokens = prompt_token_count(results);
    let completion_tokens = word_count(&markdown);
    ChatCompletionResponse {
        id: format!("chatcmpl-{created}"),
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: markdown,
            },
            finish_reason: "stop".to_string(),
        }],
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
    }
}

/// Pipeline + OCR + assembly for one document.
async fn run_document(
    state: &AppState,
    engine: &Arc<dyn OcrEngine>,
    pdf_bytes: Vec<u8>,
    skip_blank: bool,
) -> Result<(PipelineResult, Vec<OcrPageResult>, String), ServiceError> {
    info!("Processing PDF ({} bytes, skip_blank={})", pdf_bytes.len(), skip_blank);
    let options = PipelineOptions::from_config(&state.config, skip_blank);
    let pipeline = pipeline::process_document(pdf_bytes, options).await?;
    let results = recognize_pages(engine, &pipeline, state.config.ocr_concurrency).await?;
    let markdown = assemble::assemble(&results);
    Ok((pipeline, results, markdown))
}

fn ready_engine(state: &AppState) -> Result<Arc<dyn OcrEngine>, ServiceError> {
    state.engine.clone().ok_or(ServiceError::EngineNotReady)
}

/// Handle a direct upload.
pub async fn run_direct(
    state: &AppState,
    pdf_bytes: Vec<u8>,
    skip_blank: bool,
) -> Result<DirectOcrResponse, ServiceError> {
    let engine = ready_engine(state)?;
    let (pipeline, _results, markdown) = run_document(state, &engine, pdf_bytes, skip_blank).await?;
    Ok(build_direct_response(&pipeline, markdown))
}

/// Handle a chat-completions request. Blank pages are always skipped.
pub async fn run_chat(
    state: &AppState,
    request: ChatCompletionRequest,
) -> Result<ChatCompletionResponse, ServiceError> {
    let pdf_bytes = validate_chat_request(&request)?;
    let engine = ready_engine(state)?;
    let (_pipeline, results, markdown) = run_document(state, &engine, pdf_bytes, true).await?;
    let created = chrono::Utc::now().timestamp();
    Ok(build_chat_response(&request.model, &results, markdown, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ChatMessageIn, MessageContent};

    fn request(content: MessageContent) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "paddleocr-vl".into(),
            messages: vec![ChatMessageIn {
                role: "user".into(),
                content,
            }],
            temperature: 0.0,
            max_tokens: 2048,
            stream: false,
        }
    }

    fn page(n: usize, text: &str, tokens: Option<u32>) -> OcrPageResult {
        OcrPageResult {
            page_number: n,
            text: text.into(),
            prompt_tokens: tokens,
        }
    }

    #[test]
    fn data_uri_decodes() {
        let bytes = decode_pdf_data_uri("data:application/pdf;base64,JVBERi0xLjQ=").unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[test]
    fn plain_text_is_not_a_pdf() {
        assert!(matches!(
            decode_pdf_data_uri("hello world"),
            Err(RequestShapeError::NotPdfDataUri)
        ));
        assert!(matches!(
            decode_pdf_data_uri("data:image/png;base64,AAAA"),
            Err(RequestShapeError::NotPdfDataUri)
        ));
    }

    #[test]
    fn wrapped_base64_decodes() {
        let pdf: Vec<u8> = (0..120u8).collect();
        let encoded = STANDARD.encode(&pdf);
        let wrapped: Vec<&str> = encoded
            .as_bytes()
            .chunks(76)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect();
        let content = format!("{PDF_DATA_URI_PREFIX}{}\n", wrapped.join("\n"));
        assert!(content.contains('\n'));
        assert_eq!(decode_pdf_data_uri(&content).unwrap(), pdf);

        let crlf = format!("{PDF_DATA_URI_PREFIX}{}", wrapped.join("\r\n"));
        assert_eq!(decode_pdf_data_uri(&crlf).unwrap(), pdf);
    }

    #[test]
    fn bad_base64_is_rejected() {
        assert!(matches!(
            decode_pdf_data_uri("data:application/pdf;base64,***"),
            Err(RequestShapeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn last_message_carries_the_pdf() {
        let mut req = request(MessageContent::Text("ignored".into()));
        req.messages.push(ChatMessageIn {
            role: "user".into(),
            content: MessageContent::Text("data:application/pdf;base64,JVBERg==".into()),
        });
        assert_eq!(validate_chat_request(&req).unwrap(), b"%PDF");
    }

    #[test]
    fn request_validation() {
        let mut req = request(MessageContent::Text("data:application/pdf;base64,JVBERg==".into()));
        req.messages.clear();
        assert!(matches!(validate_chat_request(&req), Err(RequestShapeError::NoMessages)));

        let req = request(MessageContent::Parts(vec![]));
        assert!(matches!(
            validate_chat_request(&req),
            Err(RequestShapeError::UnsupportedContent)
        ));

        let mut req = request(MessageContent::Text("data:application/pdf;base64,JVBERg==".into()));
        req.temperature = 2.5;
        assert!(matches!(
            validate_chat_request(&req),
            Err(RequestShapeError::InvalidParameter { name: "temperature", .. })
        ));
        req.temperature = 2.0;
        req.max_tokens = 0;
        assert!(matches!(
            validate_chat_request(&req),
            Err(RequestShapeError::InvalidParameter { name: "max_tokens", .. })
        ));
    }

    #[test]
    fn prompt_tokens_fall_back_to_estimate() {
        assert_eq!(prompt_token_count(&[]), 0);
        assert_eq!(prompt_token_count(&[page(1, "a", None), page(2, "b", None)]), 200);
        assert_eq!(
            prompt_token_count(&[page(1, "a", Some(812)), page(2, "b", None)]),
            200
        );
        assert_eq!(
            prompt_token_count(&[page(1, "a", Some(812)), page(2, "b", Some(790))]),
            1602
        );
    }

    #[test]
    fn chat_response_shape() {
        let results = vec![page(1, "Hello world", None), page(3, "again", None)];
        let md = assemble::assemble(&results);
        let resp = build_chat_response("paddleocr-vl", &results, md.clone(), 1_700_000_000);
        assert_eq!(resp.id, "chatcmpl-1700000000");
        assert_eq!(resp.object, "chat.completion");
        assert_eq!(resp.created, 1_700_000_000);
        assert_eq!(resp.choices.len(), 1);
        assert_eq!(resp.choices[0].finish_reason, "stop");
        assert_eq!(resp.choices[0].message.role, "assistant");
        assert_eq!(resp.choices[0].message.content, md);
        assert_eq!(resp.usage.prompt_tokens, 200);
        assert_eq!(resp.usage.completion_tokens, word_count(&md));
        assert_eq!(
            resp.usage.total_tokens,
            resp.usage.prompt_tokens + resp.usage.completion_tokens
        );
    }

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("<!-- Page 1 -->\n\nHello  world\n---"), 7);
    }
}
