use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::snippet_contracts::SnippetCategory;

pub const PROJECT_CLASS: &str = "project";
pub const PROJECT_ID_PREFIX: &str = "proj_";

pub const ATTR_PROJECT_ID: &str = "project_id";
pub const ATTR_ALIASES: &str = "aliases";
pub const ATTR_STATUS: &str = "status";
pub const ATTR_SUMMARY: &str = "summary";
pub const ATTR_KEY_THEMES: &str = "key_themes";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    OnTrack,
    Stalled,
    NeedsReview,
    Complete,
    Unknown,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnTrack => "on-track",
            Self::Stalled => "stalled",
            Self::NeedsReview => "needs-review",
            Self::Complete => "complete",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "on-track" | "ontrack" | "順調" => Ok(Self::OnTrack),
            "stalled" | "停滞" => Ok(Self::Stalled),
            "needs-review" | "review" | "要確認" => Ok(Self::NeedsReview),
            "complete" | "completed" | "done" | "完了" => Ok(Self::Complete),
            "unknown" | "不明" => Ok(Self::Unknown),
            other => Err(format!("unknown project status: {other}")),
        }
    }
}

/// A snippet re-tagged with provenance after project association.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnifiedInformationSnippet {
    pub content: String,
    pub source_document_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub category: SnippetCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnifiedProject {
    pub project_id: String,
    pub project_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub summary: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub key_themes: Vec<String>,
    #[serde(default)]
    pub mentioned_people: Vec<String>,
    #[serde(default)]
    pub information_snippets: Vec<UnifiedInformationSnippet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionMetadata {
    pub processed_files: usize,
    pub timestamp: DateTime<Utc>,
    pub model_used: String,
    pub total_snippets: usize,
    pub projects_count: usize,
    #[serde(default)]
    pub digest_sha256: String,
    #[serde(default)]
    pub skipped_records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationResult {
    pub unified_projects: Vec<UnifiedProject>,
    pub extraction_metadata: ExtractionMetadata,
}

pub fn synthesized_project_id(sequence: usize) -> String {
    format!("{PROJECT_ID_PREFIX}{sequence:03}")
}
