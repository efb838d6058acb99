use chrono::{DateTime, Utc};
use pmpedia_association::AssociationConfig;
use pmpedia_core::extraction::ExtractionService;
use pmpedia_core::pipeline_contracts::{Phase1DocumentResult, Phase1Failure, Phase1Summary};
use pmpedia_core::snippet_contracts::counts_by_class;
use pmpedia_storage::{
    discover_snippet_artifacts, write_json_pretty, write_snippet_artifact, ArtifactLayout,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::analysis::{analyze, ProjectAnalysis};
use crate::integration::{IntegrationOutcome, IntegrationStage};
use crate::snippet::SnippetStage;
use crate::triage::TriageStage;
use crate::{Document, PipelineError, StageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase1Options {
    pub documents: Vec<PathBuf>,
    pub layout: ArtifactLayout,
}

#[derive(Debug, Clone)]
pub struct Phase1Report {
    pub summary: Phase1Summary,
    pub summary_path: PathBuf,
}

impl Phase1Report {
    pub fn has_failures(&self) -> bool {
        !self.summary.failures.is_empty()
    }

    pub fn log_details(&self) {
        info!(
            event = "phase1_summary",
            total = self.summary.total_documents,
            processed = self.summary.processed_documents,
            failed = self.summary.failures.len(),
            path = %self.summary_path.display()
        );
        for row in &self.summary.results {
            if !row.processed {
                info!(
                    event = "phase1_document_skipped",
                    document = %row.document,
                    document_type = %row.document_type,
                    relevance_score = row.relevance_score
                );
                continue;
            }
            info!(
                event = "phase1_document_processed",
                document = %row.document,
                document_type = %row.document_type,
                relevance_score = row.relevance_score,
                snippets = row.snippets_count
            );
            for (class, count) in &row.snippets_by_type {
                info!(
                    event = "phase1_document_category",
                    document = %row.document,
                    class = %class,
                    count = *count
                );
            }
        }
        for failure in &self.summary.failures {
            error!(
                event = "phase1_document_failed",
                document = %failure.document,
                error = %failure.error
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct Phase2Options {
    pub layout: ArtifactLayout,
    pub association: AssociationConfig,
}

#[derive(Debug, Clone)]
pub struct Phase2Report {
    pub outcome: IntegrationOutcome,
    pub output_path: PathBuf,
    pub analysis: ProjectAnalysis,
}

/// Every configured document must exist before any service call is made.
pub fn preflight_documents(documents: &[PathBuf]) -> Result<(), PipelineError> {
    if documents.is_empty() {
        return Err(PipelineError::NoDocuments);
    }
    match documents.iter().find(|path| !path.is_file()) {
        Some(missing) => Err(PipelineError::MissingDocument(missing.clone())),
        None => Ok(()),
    }
}

/// Triage then gated extraction, one document at a time. A failing document
/// is recorded in the summary and the loop moves on.
pub fn run_phase1<S: ExtractionService + ?Sized>(
    service: &S,
    options: &Phase1Options,
    now: DateTime<Utc>,
) -> Result<Phase1Report, PipelineError> {
    preflight_documents(&options.documents)?;
    options.layout.ensure_phase1_dir()?;

    let triage = TriageStage::new(service);
    let snippet = SnippetStage::new(service);
    let mut results = Vec::new();
    let mut failures = Vec::new();

    for (index, path) in options.documents.iter().enumerate() {
        info!(
            event = "phase1_document_started",
            position = index + 1,
            total = options.documents.len(),
            path = %path.display()
        );
        match process_document(&triage, &snippet, path, &options.layout) {
            Ok(row) => results.push(row),
            Err(err) => {
                let document = display_name(path);
                error!(event = "phase1_document_error", document = %document, error = %err);
                failures.push(Phase1Failure {
                    document,
                    error: err.to_string(),
                });
            }
        }
    }

    let summary = Phase1Summary::new(now, options.documents.len(), results, failures);
    let summary_path = options.layout.phase1_summary_path();
    write_json_pretty(&summary_path, &summary)?;

    Ok(Phase1Report {
        summary,
        summary_path,
    })
}

fn process_document<S: ExtractionService>(
    triage: &TriageStage<S>,
    snippet: &SnippetStage<S>,
    path: &Path,
    layout: &ArtifactLayout,
) -> Result<Phase1DocumentResult, StageError> {
    let document = Document::read(path)?;
    let outcome = triage.triage(&document)?;
    if !outcome.result.passes_gate() {
        info!(
            event = "document_below_threshold",
            document = %document.name,
            relevance_score = outcome.result.relevance_score
        );
        return Ok(Phase1DocumentResult::skipped(
            document.name.clone(),
            &outcome.result,
        ));
    }

    let annotated = snippet.extract(&document)?;
    let output_path = layout.snippet_artifact_path(&document.stem);
    write_snippet_artifact(&output_path, &annotated)?;

    Ok(Phase1DocumentResult::processed(
        document.name.clone(),
        &outcome.result,
        counts_by_class(&annotated.extractions),
        output_path.display().to_string(),
    ))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Integrates every phase-1 artifact. Fails before calling the service when
/// phase 1 left nothing to integrate.
pub fn run_phase2<S: ExtractionService + ?Sized>(
    service: &S,
    options: &Phase2Options,
    now: DateTime<Utc>,
) -> Result<Phase2Report, PipelineError> {
    let snippet_files = discover_snippet_artifacts(&options.layout.phase1_dir)?;
    info!(
        event = "phase2_started",
        artifacts = snippet_files.len(),
        dir = %options.layout.phase1_dir.display()
    );

    let stage = IntegrationStage::new(service, options.association.clone());
    let outcome = stage.integrate(&snippet_files, now)?;

    let output_path = options.layout.unified_projects_path();
    write_json_pretty(&output_path, &outcome.result)?;
    info!(
        event = "phase2_completed",
        projects = outcome.result.extraction_metadata.projects_count,
        path = %output_path.display()
    );

    let analysis = analyze(&outcome.result);
    analysis.log();

    Ok(Phase2Report {
        outcome,
        output_path,
        analysis,
    })
}
