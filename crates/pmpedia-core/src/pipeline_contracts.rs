use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::triage_contracts::{DocumentType, TriageResult};

/// One row of `phase1_summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase1DocumentResult {
    pub document: String,
    pub document_type: DocumentType,
    pub relevance_score: f64,
    pub summary: String,
    pub snippets_count: usize,
    #[serde(default)]
    pub snippets_by_type: BTreeMap<String, usize>,
    pub output_file: Option<String>,
    pub html_file: Option<String>,
    pub processed: bool,
}

impl Phase1DocumentResult {
    pub fn skipped(document: impl Into<String>, triage: &TriageResult) -> Self {
        Self {
            document: document.into(),
            document_type: triage.document_type,
            relevance_score: triage.relevance_score,
            summary: triage.summary.clone(),
            snippets_count: 0,
            snippets_by_type: BTreeMap::new(),
            output_file: None,
            html_file: None,
            processed: false,
        }
    }

    pub fn processed(
        document: impl Into<String>,
        triage: &TriageResult,
        snippets_by_type: BTreeMap<String, usize>,
        output_file: impl Into<String>,
    ) -> Self {
        Self {
            document: document.into(),
            document_type: triage.document_type,
            relevance_score: triage.relevance_score,
            summary: triage.summary.clone(),
            snippets_count: snippets_by_type.values().sum(),
            snippets_by_type,
            output_file: Some(output_file.into()),
            html_file: None,
            processed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase1Failure {
    pub document: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase1Summary {
    pub execution_time: DateTime<Utc>,
    pub total_documents: usize,
    pub processed_documents: usize,
    pub results: Vec<Phase1DocumentResult>,
    #[serde(default)]
    pub failures: Vec<Phase1Failure>,
}

impl Phase1Summary {
    pub fn new(
        execution_time: DateTime<Utc>,
        total_documents: usize,
        results: Vec<Phase1DocumentResult>,
        failures: Vec<Phase1Failure>,
    ) -> Self {
        let processed_documents = results.iter().filter(|result| result.processed).count();
        Self {
            execution_time,
            total_documents,
            processed_documents,
            results,
            failures,
        }
    }
}
