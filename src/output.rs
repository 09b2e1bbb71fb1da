//! Output and wire types for the OCR service.
//!
//! Field names match what existing clients of the direct and
//! OpenAI-compatible endpoints already parse; renaming any of them is a
//! breaking change.

use crate::pipeline::PageStatistics;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of OCR on a single processed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPageResult {
    /// 1-indexed source page number.
    pub page_number: usize,
    /// Cleaned engine output for this page.
    pub text: String,
    /// Prompt tokens the engine reported for this call, if it reports them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
}

// ── Direct endpoint ──────────────────────────────────────────────────────

/// Response body of `POST /ocr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectOcrResponse {
    pub success: bool,
    /// Pages in the source document.
    pub pages_total: usize,
    pub pages_processed: usize,
    pub pages_skipped: usize,
    /// Source page numbers the classifier rejected.
    pub skipped_pages: Vec<usize>,
    /// Source page numbers that were sent to the engine, in order.
    pub processed_pages: Vec<usize>,
    pub markdown: String,
    /// Character (not byte) length of `markdown`.
    pub total_chars: usize,
    /// Per-page classifier statistics; `null` when classification was disabled.
    pub page_stats: Option<Vec<PageStatistics>>,
}

// ── Chat completions ─────────────────────────────────────────────────────

fn default_model() -> String {
    "paddleocr-vl".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

/// Request body of `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessageIn>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Accepted for compatibility; responses are never streamed.
    #[serde(default)]
    pub stream: bool,
}

/// One inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageIn {
    pub role: String,
    pub content: MessageContent,
}

/// Message content: a plain string, or the structured parts array some
/// OpenAI clients send. Only the string form carries a PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(_) => None,
        }
    }
}

/// Response body of `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

/// Token accounting. `prompt_tokens` may be an estimate; see
/// [`crate::orchestrate::prompt_token_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ── Service metadata ─────────────────────────────────────────────────────

/// Response body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub device: String,
    pub cuda_available: bool,
}

/// Response body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub model: String,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub chat_completions: String,
    pub ocr_direct: String,
    pub health: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_defaults() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "data:application/pdf;base64,AAAA"}]
        }))
        .unwrap();
        assert_eq!(req.model, "paddleocr-vl");
        assert_eq!(req.temperature, 0.0);
        assert_eq!(req.max_tokens, 2048);
        assert!(!req.stream);
        assert_eq!(
            req.messages[0].content.as_text(),
            Some("data:application/pdf;base64,AAAA")
        );
    }

    #[test]
    fn parts_content_is_not_text() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}]
        }))
        .unwrap();
        assert!(req.messages[0].content.as_text().is_none());
    }

    #[test]
    fn page_stats_serialises_as_null_when_absent() {
        let resp = DirectOcrResponse {
            success: true,
            pages_total: 2,
            pages_processed: 2,
            pages_skipped: 0,
            skipped_pages: vec![],
            processed_pages: vec![1, 2],
            markdown: String::new(),
            total_chars: 0,
            page_stats: None,
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v["page_stats"].is_null());
        assert_eq!(v["processed_pages"], json!([1, 2]));
    }

    #[test]
    fn page_result_omits_missing_token_count() {
        let r = OcrPageResult {
            page_number: 1,
            text: "x".into(),
            prompt_tokens: None,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("prompt_tokens").is_none());
    }
}
