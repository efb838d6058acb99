pub mod extraction;
pub mod pipeline_contracts;
pub mod project_contracts;
pub mod snippet_contracts;
pub mod triage_contracts;

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;

/// Suffix that phase 1 appends to a document stem when naming its artifact.
pub const SNIPPET_ARTIFACT_SUFFIX: &str = "_snippets";
pub const SNIPPET_ARTIFACT_EXTENSION: &str = "jsonl";
pub const PHASE1_SUMMARY_FILE: &str = "phase1_summary.json";
pub const UNIFIED_PROJECTS_FILE: &str = "unified_projects.json";

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("unknown snippet category: {label}")]
    UnknownCategory { label: String },
    #[error("extraction text must be non-empty for class {class}")]
    EmptyExtractionText { class: String },
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

/// Stable identifier for an annotated document, derived from its text.
pub fn document_id_for(text: &str) -> String {
    let hex = sha256_hex(text.as_bytes());
    format!("doc_{}", &hex[..8])
}

/// Artifact file name for a document stem, e.g. `weekly_snippets.jsonl`.
pub fn snippet_artifact_name(document_stem: &str) -> String {
    format!("{document_stem}{SNIPPET_ARTIFACT_SUFFIX}.{SNIPPET_ARTIFACT_EXTENSION}")
}

/// Inverse of [`snippet_artifact_name`] applied to a file stem: strips the
/// trailing `_snippets` marker to recover the source document name.
pub fn document_name_from_artifact_stem(file_stem: &str) -> String {
    file_stem
        .strip_suffix(SNIPPET_ARTIFACT_SUFFIX)
        .unwrap_or(file_stem)
        .to_string()
}

/// Trims entries, drops blanks and keeps the first occurrence of each value.
pub fn dedupe_preserving_order<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }
        if seen.insert(value.to_string()) {
            out.push(value.to_string());
        }
    }
    out
}
