use pmpedia_core::document_id_for;
use pmpedia_core::extraction::{
    AnnotatedDocument, ExampleData, ExtractionConfig, ExtractionRequest, ExtractionService,
};
use pmpedia_core::snippet_contracts::counts_by_class;
use tracing::{info, warn};

use crate::few_shot::snippet_examples;
use crate::prompts::SNIPPET_PROMPT;
use crate::{Document, StageError};

const SNIPPET_PASSES: u8 = 2;
const SNIPPET_MAX_WORKERS: u8 = 5;
const SNIPPET_MAX_CHAR_BUFFER: usize = 1_500;

pub fn snippet_extraction_config() -> ExtractionConfig {
    ExtractionConfig {
        passes: SNIPPET_PASSES,
        max_workers: SNIPPET_MAX_WORKERS,
        max_char_buffer: Some(SNIPPET_MAX_CHAR_BUFFER),
    }
}

pub struct SnippetStage<S> {
    service: S,
    examples: Vec<ExampleData>,
    config: ExtractionConfig,
}

impl<S: ExtractionService> SnippetStage<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            examples: snippet_examples(),
            config: snippet_extraction_config(),
        }
    }

    /// Returns the service answer stamped with the document id and text, ready
    /// to be written as a phase-1 artifact line.
    pub fn extract(&self, document: &Document) -> Result<AnnotatedDocument, StageError> {
        let request = ExtractionRequest {
            text: &document.text,
            prompt: SNIPPET_PROMPT,
            examples: &self.examples,
            config: self.config,
        };
        let mut annotated = self.service.extract(&request).map_err(|err| {
            warn!(event = "snippet_extraction_failed", document = %document.name, error = %err);
            StageError::from(err)
        })?;

        annotated.document_id = Some(document_id_for(&document.text));
        annotated.text = Some(document.text.clone());

        let counts = counts_by_class(&annotated.extractions);
        for (class, count) in &counts {
            info!(
                event = "snippet_category_count",
                document = %document.name,
                class = %class,
                count = *count
            );
        }
        info!(
            event = "snippet_extraction_completed",
            document = %document.name,
            total = annotated.extractions.len()
        );
        Ok(annotated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmpedia_core::extraction::{Extraction, ServiceError};
    use serde_json::Map;
    use std::cell::RefCell;

    struct RecordingService {
        configs: RefCell<Vec<ExtractionConfig>>,
    }

    impl ExtractionService for RecordingService {
        fn model_id(&self) -> &str {
            "recording"
        }

        fn extract(
            &self,
            request: &ExtractionRequest<'_>,
        ) -> Result<AnnotatedDocument, ServiceError> {
            self.configs.borrow_mut().push(request.config);
            Ok(AnnotatedDocument {
                document_id: Some("ignored".to_string()),
                text: None,
                extractions: vec![
                    Extraction::new("課題", "DBの遅延", Map::new()),
                    Extraction::new("課題", "CSVの文字化け", Map::new()),
                    Extraction::new("リスク", "納期", Map::new()),
                ],
            })
        }
    }

    #[test]
    fn stamps_document_identity_and_forwards_tuning_hints() {
        let service = RecordingService {
            configs: RefCell::new(Vec::new()),
        };
        let document = Document::from_text("notes/prd.md", "スマートタグ PRD");
        let annotated = SnippetStage::new(&service)
            .extract(&document)
            .expect("extract");

        assert_eq!(
            annotated.document_id.as_deref(),
            Some(document_id_for("スマートタグ PRD").as_str())
        );
        assert_eq!(annotated.text.as_deref(), Some("スマートタグ PRD"));
        assert_eq!(annotated.extractions.len(), 3);

        let config = service.configs.borrow()[0];
        assert_eq!(config.passes, 2);
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.max_char_buffer, Some(1_500));
    }
}
