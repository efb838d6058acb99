use pmpedia_core::extraction::{
    AnnotatedDocument, ExampleData, ExtractionConfig, ExtractionRequest, ExtractionService,
};
use pmpedia_core::triage_contracts::{
    DocumentType, TriageResult, TRIAGE_CLASS_DOCUMENT_TYPE, TRIAGE_CLASS_RELEVANCE_SCORE,
    TRIAGE_CLASS_SUMMARY,
};
use tracing::{debug, info, warn};

use crate::few_shot::triage_examples;
use crate::prompts::TRIAGE_PROMPT;
use crate::{Document, StageError};

#[derive(Debug, Clone, PartialEq)]
pub struct TriageOutcome {
    pub result: TriageResult,
    pub raw: AnnotatedDocument,
}

pub struct TriageStage<S> {
    service: S,
    examples: Vec<ExampleData>,
}

impl<S: ExtractionService> TriageStage<S> {
    pub fn new(service: S) -> Self {
        Self::with_examples(service, triage_examples())
    }

    pub fn with_examples(service: S, examples: Vec<ExampleData>) -> Self {
        Self { service, examples }
    }

    /// One single-pass service call; a service failure is returned as is.
    pub fn triage(&self, document: &Document) -> Result<TriageOutcome, StageError> {
        let request = ExtractionRequest {
            text: &document.text,
            prompt: TRIAGE_PROMPT,
            examples: &self.examples,
            config: ExtractionConfig::single_pass(),
        };
        let raw = self.service.extract(&request).map_err(|err| {
            warn!(event = "triage_failed", document = %document.name, error = %err);
            StageError::from(err)
        })?;

        let result = triage_result_from(&raw);
        info!(
            event = "triage_completed",
            document = %document.name,
            document_type = %result.document_type,
            relevance_score = result.relevance_score,
            passes_gate = result.passes_gate()
        );
        Ok(TriageOutcome { result, raw })
    }
}

/// Converts the raw triage answer. Missing or unrecognised fields fall back
/// to `unknown`, `0.0` and an empty summary.
pub fn triage_result_from(annotated: &AnnotatedDocument) -> TriageResult {
    let document_type = match annotated.first_text_of(TRIAGE_CLASS_DOCUMENT_TYPE) {
        Some(label) => label.parse::<DocumentType>().unwrap_or_else(|err| {
            warn!(event = "triage_document_type_unrecognized", label = %label, error = %err);
            DocumentType::Other
        }),
        None => {
            debug!(event = "triage_document_type_missing");
            DocumentType::Unknown
        }
    };

    let summary = annotated
        .first_text_of(TRIAGE_CLASS_SUMMARY)
        .map(|summary| summary.trim().to_string())
        .unwrap_or_default();

    TriageResult {
        document_type,
        relevance_score: parse_relevance_score(annotated),
        summary,
    }
}

/// First finite score wins and is clamped into `[0, 1]`.
pub fn parse_relevance_score(annotated: &AnnotatedDocument) -> f64 {
    let candidates = annotated
        .extractions
        .iter()
        .filter(|extraction| extraction.is_class(TRIAGE_CLASS_RELEVANCE_SCORE));

    for candidate in candidates {
        let raw = candidate.extraction_text.trim();
        let score = match raw.parse::<f64>() {
            Ok(score) if score.is_finite() => score,
            _ => {
                warn!(event = "relevance_score_unparseable", value = %raw);
                continue;
            }
        };
        if !(0.0..=1.0).contains(&score) {
            warn!(event = "relevance_score_clamped", value = score);
            return score.clamp(0.0, 1.0);
        }
        return score;
    }

    0.0
}
