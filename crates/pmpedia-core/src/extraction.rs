//! Wire contract for the external extraction service.
//!
//! The service receives a document, a prompt description and a handful of
//! few-shot examples, and answers with a flat list of typed spans. Everything
//! the pipeline knows about the service goes through [`ExtractionService`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::dedupe_preserving_order;

pub const DEFAULT_MODEL_ID: &str = "gemini-2.5-flash-lite";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extraction {
    pub extraction_class: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub extraction_text: String,
    #[serde(default, deserialize_with = "deserialize_attributes")]
    pub attributes: Map<String, Value>,
}

impl Extraction {
    pub fn new(
        extraction_class: impl Into<String>,
        extraction_text: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            extraction_class: extraction_class.into(),
            extraction_text: extraction_text.into(),
            attributes,
        }
    }

    pub fn is_class(&self, class: &str) -> bool {
        self.extraction_class.trim().eq_ignore_ascii_case(class)
    }

    /// String attribute; numbers and booleans are rendered, blanks are `None`.
    pub fn string_attr(&self, key: &str) -> Option<String> {
        let value = match self.attributes.get(key)? {
            Value::String(value) => value.trim().to_string(),
            Value::Number(value) => value.to_string(),
            Value::Bool(value) => value.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    }

    /// List attribute. A bare string counts as a one-element list; other
    /// shapes yield an empty list.
    pub fn string_list_attr(&self, key: &str) -> Vec<String> {
        match self.attributes.get(key) {
            Some(Value::Array(values)) => {
                dedupe_preserving_order(values.iter().filter_map(|value| match value {
                    Value::String(value) => Some(value.clone()),
                    Value::Number(value) => Some(value.to_string()),
                    _ => None,
                }))
            }
            Some(Value::String(value)) => dedupe_preserving_order([value.as_str()]),
            _ => Vec::new(),
        }
    }
}

/// Output of one service call, also the line format of phase-1 artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnnotatedDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "deserialize_extractions")]
    pub extractions: Vec<Extraction>,
}

impl AnnotatedDocument {
    pub fn first_text_of(&self, class: &str) -> Option<&str> {
        self.extractions
            .iter()
            .find(|extraction| extraction.is_class(class))
            .map(|extraction| extraction.extraction_text.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExampleData {
    pub text: String,
    pub extractions: Vec<Extraction>,
}

/// Tuning hints forwarded to the service. Chunking and multi-pass fusion are
/// the service's business; the pipeline only picks the numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub passes: u8,
    pub max_workers: u8,
    pub max_char_buffer: Option<usize>,
}

impl ExtractionConfig {
    pub fn single_pass() -> Self {
        Self {
            passes: 1,
            max_workers: 1,
            max_char_buffer: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::single_pass()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub text: &'a str,
    pub prompt: &'a str,
    pub examples: &'a [ExampleData],
    pub config: ExtractionConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceFailureKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Server,
    Transport,
    InvalidOutput,
    Other,
}

impl ServiceFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
            Self::Server => "server",
            Self::Transport => "transport",
            Self::InvalidOutput => "invalid_output",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ServiceFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("extraction service error ({kind}): {message}")]
pub struct ServiceError {
    pub kind: ServiceFailureKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub trait ExtractionService {
    /// Model identifier reported in run metadata.
    fn model_id(&self) -> &str;

    fn extract(&self, request: &ExtractionRequest<'_>) -> Result<AnnotatedDocument, ServiceError>;
}

impl<T: ExtractionService + ?Sized> ExtractionService for &T {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn extract(&self, request: &ExtractionRequest<'_>) -> Result<AnnotatedDocument, ServiceError> {
        (**self).extract(request)
    }
}

impl<T: ExtractionService + ?Sized> ExtractionService for Box<T> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn extract(&self, request: &ExtractionRequest<'_>) -> Result<AnnotatedDocument, ServiceError> {
        (**self).extract(request)
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected string or scalar for extraction_text",
        )),
    }
}

fn deserialize_attributes<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Map<String, Value>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

fn deserialize_extractions<'de, D>(deserializer: D) -> Result<Vec<Extraction>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Vec<Extraction>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_attributes_and_numeric_text_are_tolerated() {
        let extraction: Extraction = serde_json::from_value(json!({
            "extraction_class": "relevance_score",
            "extraction_text": 0.95,
            "attributes": null
        }))
        .expect("parse extraction");
        assert_eq!(extraction.extraction_text, "0.95");
        assert!(extraction.attributes.is_empty());
    }

    #[test]
    fn list_attributes_accept_arrays_and_bare_strings() {
        let extraction: Extraction = serde_json::from_value(json!({
            "extraction_class": "progress",
            "extraction_text": "shipped the PRD",
            "attributes": {
                "project_keywords": ["SmartTag", "PRD", "SmartTag", ""],
                "people": "Aoki",
                "status": 3
            }
        }))
        .expect("parse extraction");

        assert_eq!(
            extraction.string_list_attr("project_keywords"),
            vec!["SmartTag", "PRD"]
        );
        assert_eq!(extraction.string_list_attr("people"), vec!["Aoki"]);
        assert!(extraction.string_list_attr("missing").is_empty());
        assert_eq!(extraction.string_attr("status").as_deref(), Some("3"));
    }

    #[test]
    fn annotated_document_defaults_missing_extractions() {
        let doc: AnnotatedDocument =
            serde_json::from_str(r#"{"document_id":"doc_1","extractions":null}"#)
                .expect("parse document");
        assert!(doc.extractions.is_empty());
        assert_eq!(doc.document_id.as_deref(), Some("doc_1"));
    }

    #[test]
    fn class_lookup_is_case_insensitive() {
        let doc = AnnotatedDocument {
            extractions: vec![Extraction::new("Summary", "short text", Map::new())],
            ..AnnotatedDocument::default()
        };
        assert_eq!(doc.first_text_of("summary"), Some("short text"));
        assert_eq!(doc.first_text_of("document_type"), None);
    }
}
