pub mod analysis;
pub mod few_shot;
pub mod integration;
pub mod pipeline;
pub mod prompts;
pub mod snippet;
pub mod triage;

use pmpedia_core::extraction::ServiceError;
use pmpedia_core::ContractError;
use pmpedia_storage::StorageError;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use analysis::{analyze, ProjectAnalysis};
pub use integration::{render_digest, IntegrationOutcome, IntegrationStage, DIGEST_SNIPPET_LIMIT};
pub use pipeline::{
    preflight_documents, run_phase1, run_phase2, Phase1Options, Phase1Report, Phase2Options,
    Phase2Report,
};
pub use snippet::SnippetStage;
pub use triage::{parse_relevance_score, triage_result_from, TriageOutcome, TriageStage};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to read document {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no input documents configured")]
    NoDocuments,
    #[error("input document not found: {}", .0.display())]
    MissingDocument(PathBuf),
    #[error("stage error: {0}")]
    Stage(#[from] StageError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A UTF-8 input document, read once and then only borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    /// File name including the extension, used in summaries and logs.
    pub name: String,
    /// File name without the extension, used to name artifacts.
    pub stem: String,
    pub text: String,
}

impl Document {
    pub fn read(path: &Path) -> Result<Self, StageError> {
        let text = fs::read_to_string(path).map_err(|source| StageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(path, text))
    }

    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        Self {
            path,
            name,
            stem,
            text: text.into(),
        }
    }
}
