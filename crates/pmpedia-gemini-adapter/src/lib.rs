//! [`ExtractionService`] backed by the Gemini `generateContent` endpoint.
//!
//! Each request renders the prompt description, the few-shot examples and
//! the input into one user turn and asks for a JSON object of the form
//! `{"extractions": [...]}`. Tuning hints are logged but the whole input is
//! sent in a single call. Failures are mapped to [`ServiceFailureKind`]; there
//! is no retry.

use pmpedia_core::extraction::{
    AnnotatedDocument, ExampleData, Extraction, ExtractionRequest, ExtractionService,
    ServiceError, ServiceFailureKind, DEFAULT_MODEL_ID,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
const API_KEY_HEADER: &str = "x-goog-api-key";
const ERROR_BODY_MAX_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("api key is empty")]
    MissingApiKey,
    #[error("failed to build http client: {0}")]
    Client(String),
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model_id: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct GeminiExtractionService {
    config: GeminiConfig,
    client: reqwest::blocking::Client,
}

impl GeminiExtractionService {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        if config.api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GeminiError::Client(err.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> String {
        endpoint_for(&self.config.api_base, &self.config.model_id)
    }
}

impl ExtractionService for GeminiExtractionService {
    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn extract(&self, request: &ExtractionRequest<'_>) -> Result<AnnotatedDocument, ServiceError> {
        debug!(
            event = "gemini_request",
            model = %self.config.model_id,
            input_chars = request.text.chars().count(),
            examples = request.examples.len(),
            passes = request.config.passes,
            max_workers = request.config.max_workers,
            max_char_buffer = ?request.config.max_char_buffer
        );

        let body = build_request_body(request);
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .map_err(|err| ServiceError::new(ServiceFailureKind::Transport, err.to_string()))?;

        let status = response.status().as_u16();
        let body_text = response
            .text()
            .map_err(|err| ServiceError::new(ServiceFailureKind::Transport, err.to_string()))?;

        if !(200..300).contains(&status) {
            let err = parse_http_error(status, &body_text);
            warn!(event = "gemini_http_error", status, kind = %err.kind);
            return Err(err);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body_text).map_err(|err| {
            ServiceError::new(
                ServiceFailureKind::InvalidOutput,
                format!("failed to parse response envelope: {err}"),
            )
        })?;
        let output = response_text(&parsed)?;
        parse_extractions(&output)
    }
}

pub fn endpoint_for(api_base: &str, model_id: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        api_base.trim_end_matches('/'),
        model_id
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Serialize)]
struct ExtractionsEnvelope<'a> {
    extractions: &'a [Extraction],
}

pub fn build_request_body(request: &ExtractionRequest<'_>) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(render_prompt(request.prompt, request.examples, request.text)),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: 0.0,
            response_mime_type: "application/json".to_string(),
        },
    }
}

pub fn render_prompt(description: &str, examples: &[ExampleData], input: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "{}", description.trim());
    let _ = writeln!(
        prompt,
        "\nAnswer with a JSON object {{\"extractions\": [...]}} where each item has \
         \"extraction_class\", \"extraction_text\" and \"attributes\". \
         Copy extraction_text verbatim from the input."
    );

    if !examples.is_empty() {
        let _ = writeln!(prompt, "\nExamples:");
    }
    for example in examples {
        let rendered = serde_json::to_string(&ExtractionsEnvelope {
            extractions: &example.extractions,
        })
        .unwrap_or_else(|_| "{\"extractions\": []}".to_string());
        let _ = writeln!(prompt, "\nInput:\n{}\nOutput:\n{rendered}", example.text.trim());
    }

    let _ = write!(prompt, "\nInput:\n{input}\nOutput:\n");
    prompt
}

/// Text of the first candidate's parts, concatenated.
pub fn response_text(response: &GenerateContentResponse) -> Result<String, ServiceError> {
    let candidate = response.candidates.first().ok_or_else(|| {
        ServiceError::new(ServiceFailureKind::InvalidOutput, "response has no candidates")
    })?;
    let text = candidate
        .content
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect::<String>();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(ServiceError::new(
            ServiceFailureKind::InvalidOutput,
            format!("candidate has no text (finish reason: {reason})"),
        ));
    }
    Ok(text)
}

/// Accepts `{"extractions": [...]}` or a bare array, optionally wrapped in a
/// markdown code fence.
pub fn parse_extractions(output: &str) -> Result<AnnotatedDocument, ServiceError> {
    let json = strip_code_fence(output);
    let invalid = |err: serde_json::Error| {
        ServiceError::new(
            ServiceFailureKind::InvalidOutput,
            format!("model output is not valid extraction json: {err}"),
        )
    };

    let value: Value = serde_json::from_str(json).map_err(invalid)?;
    let value = match value {
        Value::Array(items) => serde_json::json!({ "extractions": items }),
        other => other,
    };
    serde_json::from_value(value).map_err(invalid)
}

fn strip_code_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

pub fn parse_http_error(status: u16, body: &str) -> ServiceError {
    let body = truncate(body.trim(), ERROR_BODY_MAX_CHARS);
    match status {
        401 => ServiceError::new(
            ServiceFailureKind::Authentication,
            format!("invalid api key: {body}"),
        ),
        403 => ServiceError::new(
            ServiceFailureKind::Authentication,
            format!("access denied: {body}"),
        ),
        429 => ServiceError::new(ServiceFailureKind::RateLimited, body),
        400 | 404 | 413 => ServiceError::new(
            ServiceFailureKind::InvalidRequest,
            format!("HTTP {status}: {body}"),
        ),
        500..=599 => ServiceError::new(
            ServiceFailureKind::Server,
            format!("HTTP {status}: {body}"),
        ),
        _ => ServiceError::new(ServiceFailureKind::Other, format!("HTTP {status}: {body}")),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &value[..index]),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmpedia_core::extraction::ExtractionConfig;
    use serde_json::{json, Map};

    fn example() -> ExampleData {
        ExampleData {
            text: "スマートタグ機能のPRDを完成させた".to_string(),
            extractions: vec![Extraction::new(
                "進捗報告",
                "スマートタグ機能のPRDを完成させた",
                Map::new(),
            )],
        }
    }

    #[test]
    fn prompt_contains_description_examples_and_input_in_order() {
        let prompt = render_prompt("抽出してください", &[example()], "本文テキスト");
        let description = prompt.find("抽出してください").expect("description");
        let example_output = prompt.find("\"extraction_class\":\"進捗報告\"").expect("example");
        let input = prompt.find("本文テキスト").expect("input");
        assert!(description < example_output);
        assert!(example_output < input);
        assert!(prompt.ends_with("Output:\n"));
    }

    #[test]
    fn request_body_uses_gemini_field_names() {
        let examples = [example()];
        let request = ExtractionRequest {
            text: "input",
            prompt: "describe",
            examples: &examples,
            config: ExtractionConfig::single_pass(),
        };
        let body = serde_json::to_value(build_request_body(&request)).expect("serialize");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(body["contents"][0]["parts"][0]["text"]
            .as_str()
            .expect("text part")
            .contains("describe"));
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        assert_eq!(
            endpoint_for("https://example.test/v1beta/", "gemini-2.5-flash-lite"),
            "https://example.test/v1beta/models/gemini-2.5-flash-lite:generateContent"
        );
    }

    #[test]
    fn parses_fenced_object_and_bare_array() {
        let fenced = "```json\n{\"extractions\": [{\"extraction_class\": \"課題\", \"extraction_text\": \"遅い\", \"attributes\": {\"people\": [\"田中\"]}}]}\n```";
        let parsed = parse_extractions(fenced).expect("fenced output");
        assert_eq!(parsed.extractions.len(), 1);
        assert_eq!(parsed.extractions[0].string_list_attr("people"), vec!["田中"]);

        let bare = r#"[{"extraction_class": "relevance_score", "extraction_text": 0.8}]"#;
        let parsed = parse_extractions(bare).expect("bare array");
        assert_eq!(parsed.extractions[0].extraction_text, "0.8");
    }

    #[test]
    fn non_json_output_is_invalid_output() {
        let err = parse_extractions("I could not find anything").expect_err("prose");
        assert_eq!(err.kind, ServiceFailureKind::InvalidOutput);
    }

    #[test]
    fn response_text_reads_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "{\"extractions\""}, {"text": ": []}"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .expect("response");
        assert_eq!(response_text(&response).expect("text"), "{\"extractions\": []}");

        let blocked: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .expect("response");
        let err = response_text(&blocked).expect_err("no text");
        assert!(err.message.contains("SAFETY"));

        let empty = GenerateContentResponse::default();
        assert!(response_text(&empty).is_err());
    }

    #[test]
    fn http_statuses_map_to_failure_kinds() {
        assert_eq!(
            parse_http_error(401, "bad key").kind,
            ServiceFailureKind::Authentication
        );
        assert_eq!(
            parse_http_error(403, "denied").kind,
            ServiceFailureKind::Authentication
        );
        assert_eq!(
            parse_http_error(429, "quota").kind,
            ServiceFailureKind::RateLimited
        );
        assert_eq!(
            parse_http_error(400, "bad").kind,
            ServiceFailureKind::InvalidRequest
        );
        assert_eq!(parse_http_error(503, "down").kind, ServiceFailureKind::Server);
        assert_eq!(parse_http_error(302, "moved").kind, ServiceFailureKind::Other);
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "あ".repeat(ERROR_BODY_MAX_CHARS + 10);
        let err = parse_http_error(500, &body);
        assert!(err.message.ends_with("..."));
        assert!(!err.message.contains(&body));
    }

    #[test]
    fn empty_api_key_is_rejected_and_debug_redacts_it() {
        assert!(matches!(
            GeminiExtractionService::new(GeminiConfig::new("  ")),
            Err(GeminiError::MissingApiKey)
        ));
        let rendered = format!("{:?}", GeminiConfig::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }
}
