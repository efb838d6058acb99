use chrono::{DateTime, Utc};
use pmpedia_association::{AssociationConfig, KeywordAssociator};
use pmpedia_core::extraction::{
    AnnotatedDocument, ExampleData, Extraction, ExtractionConfig, ExtractionRequest,
    ExtractionService,
};
use pmpedia_core::project_contracts::{
    synthesized_project_id, ExtractionMetadata, IntegrationResult, ProjectStatus, UnifiedProject,
    ATTR_ALIASES, ATTR_KEY_THEMES, ATTR_PROJECT_ID, ATTR_STATUS, ATTR_SUMMARY, PROJECT_CLASS,
};
use pmpedia_core::sha256_hex;
use pmpedia_core::snippet_contracts::{SourcedSnippet, ATTR_PEOPLE};
use pmpedia_storage::{load_snippet_pool, LoadReport, SnippetPool};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::few_shot::integration_examples;
use crate::prompts::INTEGRATION_PROMPT;
use crate::StageError;

/// Snippets rendered into the merge-call digest; the rest are summarised in
/// a trailing notice.
pub const DIGEST_SNIPPET_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct IntegrationOutcome {
    pub result: IntegrationResult,
    pub load_report: LoadReport,
    pub digest: String,
}

pub struct IntegrationStage<S> {
    service: S,
    associator: KeywordAssociator,
    examples: Vec<ExampleData>,
}

impl<S: ExtractionService> IntegrationStage<S> {
    pub fn new(service: S, association: AssociationConfig) -> Self {
        Self {
            service,
            associator: KeywordAssociator::new(association),
            examples: integration_examples(),
        }
    }

    /// Loads every artifact, asks the service once for the project list and
    /// attaches snippets from the full pool. A service failure aborts the
    /// whole integration.
    pub fn integrate(
        &self,
        snippet_files: &[PathBuf],
        now: DateTime<Utc>,
    ) -> Result<IntegrationOutcome, StageError> {
        let pool = load_snippet_pool(snippet_files);
        info!(
            event = "snippet_pool_loaded",
            files = snippet_files.len(),
            files_read = pool.report.files_read,
            snippets = pool.len(),
            documents = pool.documents().len(),
            skipped = pool.report.skipped.len(),
            unreadable = pool.report.unreadable_files.len()
        );
        if pool.is_empty() {
            warn!(event = "snippet_pool_empty", files = snippet_files.len());
        }

        let digest = render_digest(&pool);
        let request = ExtractionRequest {
            text: &digest,
            prompt: INTEGRATION_PROMPT,
            examples: &self.examples,
            config: ExtractionConfig::single_pass(),
        };
        let answer = self.service.extract(&request).map_err(|err| {
            warn!(event = "integration_failed", error = %err);
            StageError::from(err)
        })?;

        let unified_projects = build_projects(&answer, &pool.snippets, &self.associator, now);
        let total_snippets = unified_projects
            .iter()
            .map(|project| project.information_snippets.len())
            .sum();

        let extraction_metadata = ExtractionMetadata {
            // Every requested artifact counts, readable or not.
            processed_files: snippet_files.len(),
            timestamp: now,
            model_used: self.service.model_id().to_string(),
            total_snippets,
            projects_count: unified_projects.len(),
            digest_sha256: sha256_hex(digest.as_bytes()),
            skipped_records: pool.report.skipped.len(),
        };
        info!(
            event = "integration_completed",
            projects = extraction_metadata.projects_count,
            attached_snippets = extraction_metadata.total_snippets
        );

        Ok(IntegrationOutcome {
            result: IntegrationResult {
                unified_projects,
                extraction_metadata,
            },
            load_report: pool.report,
            digest,
        })
    }
}

/// Text form of the pool grouped by source document, capped at
/// [`DIGEST_SNIPPET_LIMIT`] snippets.
pub fn render_digest(pool: &SnippetPool) -> String {
    let mut digest = String::new();
    let _ = writeln!(digest, "Extracted snippets ({} total):", pool.len());

    let mut current_document: Option<&str> = None;
    for sourced in pool.snippets.iter().take(DIGEST_SNIPPET_LIMIT) {
        if current_document != Some(sourced.source_document.as_str()) {
            let _ = writeln!(digest, "\n[Document: {}]", sourced.source_document);
            current_document = Some(sourced.source_document.as_str());
        }
        let snippet = &sourced.snippet;
        let _ = writeln!(
            digest,
            "- {}: \"{}\"",
            snippet.category.prompt_label(),
            snippet.content
        );
        if !snippet.project_keywords.is_empty() {
            let _ = writeln!(digest, "  Keywords: {}", snippet.project_keywords.join(", "));
        }
        if !snippet.mentioned_people.is_empty() {
            let _ = writeln!(digest, "  People: {}", snippet.mentioned_people.join(", "));
        }
    }

    let remaining = pool.len().saturating_sub(DIGEST_SNIPPET_LIMIT);
    if remaining > 0 {
        let _ = writeln!(digest, "\n... ({remaining} more snippets omitted)");
    }
    digest
}

/// Turns every `project` extraction into a [`UnifiedProject`] in answer
/// order. Extractions with a blank name are dropped.
pub fn build_projects(
    answer: &AnnotatedDocument,
    pool: &[SourcedSnippet],
    associator: &KeywordAssociator,
    now: DateTime<Utc>,
) -> Vec<UnifiedProject> {
    let mut ids = ProjectIdAllocator::default();
    let mut projects = Vec::new();

    for extraction in answer
        .extractions
        .iter()
        .filter(|extraction| extraction.is_class(PROJECT_CLASS))
    {
        let project_name = extraction.extraction_text.trim();
        if project_name.is_empty() {
            warn!(event = "project_without_name_skipped");
            continue;
        }

        let aliases = extraction.string_list_attr(ATTR_ALIASES);
        let project_id = ids.assign(
            extraction.string_attr(ATTR_PROJECT_ID),
            projects.len() + 1,
        );
        let information_snippets = associator.associate(project_name, &aliases, pool, now);
        debug!(
            event = "project_associated",
            project_id = %project_id,
            project = %project_name,
            snippets = information_snippets.len()
        );

        projects.push(UnifiedProject {
            project_id,
            project_name: project_name.to_string(),
            status: project_status(extraction),
            summary: extraction.string_attr(ATTR_SUMMARY).unwrap_or_default(),
            last_updated: now,
            key_themes: extraction.string_list_attr(ATTR_KEY_THEMES),
            mentioned_people: extraction.string_list_attr(ATTR_PEOPLE),
            aliases,
            information_snippets,
        });
    }

    projects
}

fn project_status(extraction: &Extraction) -> ProjectStatus {
    let Some(label) = extraction.string_attr(ATTR_STATUS) else {
        return ProjectStatus::Unknown;
    };
    label.parse().unwrap_or_else(|err| {
        warn!(event = "project_status_unrecognized", label = %label, error = %err);
        ProjectStatus::Unknown
    })
}

/// Ids are unique within one run. A supplied id is kept unless blank or
/// taken; otherwise the project's position is bumped to the next free
/// `proj_NNN`.
#[derive(Debug, Default)]
struct ProjectIdAllocator {
    used: HashSet<String>,
}

impl ProjectIdAllocator {
    fn assign(&mut self, supplied: Option<String>, position: usize) -> String {
        if let Some(id) = supplied {
            if self.used.insert(id.clone()) {
                return id;
            }
            warn!(event = "project_id_duplicate", project_id = %id);
        }

        let mut sequence = position;
        loop {
            let candidate = synthesized_project_id(sequence);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            sequence += 1;
        }
    }
}
