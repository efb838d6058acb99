use globset::{Glob, GlobMatcher};
use pmpedia_core::extraction::AnnotatedDocument;
use pmpedia_core::snippet_contracts::{InformationSnippet, SourcedSnippet};
use pmpedia_core::{
    document_name_from_artifact_stem, snippet_artifact_name, PHASE1_SUMMARY_FILE,
    SNIPPET_ARTIFACT_EXTENSION, SNIPPET_ARTIFACT_SUFFIX, UNIFIED_PROJECTS_FILE,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_PHASE1_DIR: &str = "data/output/phase1";
pub const DEFAULT_PHASE2_DIR: &str = "data/output/phase2";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error at {}: {message}", .path.display())]
    Serialization { path: PathBuf, message: String },
    #[error("invalid artifact pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },
    #[error("no snippet artifacts matching {pattern} in {}; run phase 1 first", .dir.display())]
    NoSnippetArtifacts { dir: PathBuf, pattern: String },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where each phase reads and writes its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub phase1_dir: PathBuf,
    pub phase2_dir: PathBuf,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE1_DIR, DEFAULT_PHASE2_DIR)
    }
}

impl ArtifactLayout {
    pub fn new(phase1_dir: impl Into<PathBuf>, phase2_dir: impl Into<PathBuf>) -> Self {
        Self {
            phase1_dir: phase1_dir.into(),
            phase2_dir: phase2_dir.into(),
        }
    }

    pub fn snippet_artifact_path(&self, document_stem: &str) -> PathBuf {
        self.phase1_dir.join(snippet_artifact_name(document_stem))
    }

    pub fn phase1_summary_path(&self) -> PathBuf {
        self.phase1_dir.join(PHASE1_SUMMARY_FILE)
    }

    pub fn unified_projects_path(&self) -> PathBuf {
        self.phase2_dir.join(UNIFIED_PROJECTS_FILE)
    }

    pub fn ensure_phase1_dir(&self) -> Result<(), StorageError> {
        ensure_dir(&self.phase1_dir)
    }

    pub fn ensure_phase2_dir(&self) -> Result<(), StorageError> {
        ensure_dir(&self.phase2_dir)
    }
}

pub fn ensure_dir(path: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(path).map_err(|err| StorageError::io(path, err))
}

/// Writes one annotated document as a single JSON line, replacing any
/// previous file at `path`.
pub fn write_snippet_artifact(
    path: &Path,
    document: &AnnotatedDocument,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let line = serde_json::to_string(document).map_err(|err| StorageError::Serialization {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    fs::write(path, format!("{line}\n")).map_err(|err| StorageError::io(path, err))?;
    debug!(
        event = "snippet_artifact_written",
        path = %path.display(),
        extractions = document.extractions.len()
    );
    Ok(())
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut rendered =
        serde_json::to_string_pretty(value).map_err(|err| StorageError::Serialization {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    rendered.push('\n');
    fs::write(path, rendered).map_err(|err| StorageError::io(path, err))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let contents = fs::read_to_string(path).map_err(|err| StorageError::io(path, err))?;
    serde_json::from_str(&contents).map_err(|err| StorageError::Serialization {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

pub fn snippet_artifact_pattern() -> String {
    format!("*{SNIPPET_ARTIFACT_SUFFIX}.{SNIPPET_ARTIFACT_EXTENSION}")
}

fn snippet_artifact_matcher() -> Result<GlobMatcher, StorageError> {
    let pattern = snippet_artifact_pattern();
    Glob::new(&pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|err| StorageError::Pattern {
            pattern,
            message: err.to_string(),
        })
}

/// Snippet artifacts directly inside `dir`, sorted by file name. An empty
/// or missing directory is an error.
pub fn discover_snippet_artifacts(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let matcher = snippet_artifact_matcher()?;
    let no_artifacts = || StorageError::NoSnippetArtifacts {
        dir: dir.to_path_buf(),
        pattern: snippet_artifact_pattern(),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(no_artifacts()),
        Err(err) => return Err(StorageError::io(dir, err)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| StorageError::io(dir, err))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if matcher.is_match(file_name) {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(no_artifacts());
    }
    paths.sort();
    Ok(paths)
}

/// Source document name for an artifact path (`weekly_snippets.jsonl` →
/// `weekly`).
pub fn document_name_for_artifact(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    document_name_from_artifact_stem(&stem)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MalformedJson(String),
    InvalidSnippet { extraction_index: usize, reason: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJson(reason) => write!(f, "malformed json: {reason}"),
            Self::InvalidSnippet {
                extraction_index,
                reason,
            } => write!(f, "invalid snippet #{extraction_index}: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub file: PathBuf,
    pub line_number: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableFile {
    pub file: PathBuf,
    pub error: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub files_read: usize,
    pub lines_read: usize,
    pub records_loaded: usize,
    pub snippets_loaded: usize,
    pub skipped: Vec<SkippedRecord>,
    pub unreadable_files: Vec<UnreadableFile>,
}

impl LoadReport {
    pub fn skipped_lines(&self) -> usize {
        self.skipped
            .iter()
            .filter(|record| matches!(record.reason, SkipReason::MalformedJson(_)))
            .count()
    }
}

/// Every snippet from a set of phase-1 artifacts, in file-then-line order.
#[derive(Debug, Default, Clone)]
pub struct SnippetPool {
    pub snippets: Vec<SourcedSnippet>,
    pub report: LoadReport,
}

impl SnippetPool {
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Distinct source documents in encounter order.
    pub fn documents(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for sourced in &self.snippets {
            if !out.contains(&sourced.source_document.as_str()) {
                out.push(sourced.source_document.as_str());
            }
        }
        out
    }
}

/// Loads artifacts line by line. Malformed lines and invalid records are
/// skipped and reported; an unreadable file is reported and the rest still
/// load.
pub fn load_snippet_pool(paths: &[PathBuf]) -> SnippetPool {
    let mut pool = SnippetPool::default();

    for path in paths {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(event = "snippet_file_unreadable", path = %path.display(), error = %err);
                pool.report.unreadable_files.push(UnreadableFile {
                    file: path.clone(),
                    error: err.to_string(),
                });
                continue;
            }
        };
        pool.report.files_read += 1;
        let document = document_name_for_artifact(path);
        debug!(event = "snippet_file_loading", path = %path.display(), document = %document);

        for (index, line) in contents.lines().enumerate() {
            let line_number = index + 1;
            if line.trim().is_empty() {
                continue;
            }
            pool.report.lines_read += 1;

            let record: AnnotatedDocument = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(err) => {
                    warn!(
                        event = "snippet_line_malformed",
                        path = %path.display(),
                        line = line_number,
                        error = %err
                    );
                    pool.report.skipped.push(SkippedRecord {
                        file: path.clone(),
                        line_number,
                        reason: SkipReason::MalformedJson(err.to_string()),
                    });
                    continue;
                }
            };
            pool.report.records_loaded += 1;

            for (extraction_index, extraction) in record.extractions.iter().enumerate() {
                match InformationSnippet::from_extraction(extraction) {
                    Ok(snippet) => {
                        pool.snippets.push(SourcedSnippet {
                            source_document: document.clone(),
                            line_number,
                            snippet,
                        });
                        pool.report.snippets_loaded += 1;
                    }
                    Err(err) => {
                        warn!(
                            event = "snippet_record_invalid",
                            path = %path.display(),
                            line = line_number,
                            extraction = extraction_index,
                            error = %err
                        );
                        pool.report.skipped.push(SkippedRecord {
                            file: path.clone(),
                            line_number,
                            reason: SkipReason::InvalidSnippet {
                                extraction_index,
                                reason: err.to_string(),
                            },
                        });
                    }
                }
            }
        }
    }

    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmpedia_core::extraction::Extraction;
    use pmpedia_core::snippet_contracts::SnippetCategory;
    use serde_json::{json, Map, Value};
    use tempfile::tempdir;

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn annotated(extractions: Vec<Extraction>) -> AnnotatedDocument {
        AnnotatedDocument {
            document_id: Some("doc_test".to_string()),
            text: None,
            extractions,
        }
    }

    #[test]
    fn written_artifact_reloads_into_the_same_tuples() {
        let dir = tempdir().expect("temp dir");
        let layout = ArtifactLayout::new(dir.path().join("phase1"), dir.path().join("phase2"));
        let path = layout.snippet_artifact_path("weekly_review_2025-W33");

        let document = annotated(vec![
            Extraction::new(
                "進捗報告",
                "スマートタグ機能のPRDを完成させた",
                attrs(json!({"project_keywords": ["スマートタグ", "PRD"], "people": []})),
            ),
            Extraction::new(
                "課題",
                "チームメンバーのAさんが体調不良で稼働率低下",
                attrs(json!({"project_keywords": [], "people": ["Aさん"]})),
            ),
        ]);
        write_snippet_artifact(&path, &document).expect("write artifact");

        let pool = load_snippet_pool(&[path]);
        assert_eq!(pool.report.files_read, 1);
        assert_eq!(pool.report.records_loaded, 1);
        assert!(pool.report.skipped.is_empty());

        let tuples = pool
            .snippets
            .iter()
            .map(|sourced| {
                (
                    sourced.source_document.clone(),
                    sourced.snippet.category,
                    sourced.snippet.content.clone(),
                    sourced.snippet.project_keywords.clone(),
                    sourced.snippet.mentioned_people.clone(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            tuples,
            vec![
                (
                    "weekly_review_2025-W33".to_string(),
                    SnippetCategory::Progress,
                    "スマートタグ機能のPRDを完成させた".to_string(),
                    vec!["スマートタグ".to_string(), "PRD".to_string()],
                    Vec::new(),
                ),
                (
                    "weekly_review_2025-W33".to_string(),
                    SnippetCategory::Issue,
                    "チームメンバーのAさんが体調不良で稼働率低下".to_string(),
                    Vec::new(),
                    vec!["Aさん".to_string()],
                ),
            ]
        );
    }

    #[test]
    fn rewriting_an_artifact_replaces_previous_contents() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("journal_snippets.jsonl");

        write_snippet_artifact(
            &path,
            &annotated(vec![Extraction::new("risk", "old risk", Map::new())]),
        )
        .expect("first write");
        write_snippet_artifact(
            &path,
            &annotated(vec![Extraction::new("decision", "new decision", Map::new())]),
        )
        .expect("second write");

        let pool = load_snippet_pool(&[path]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.snippets[0].snippet.content, "new decision");
    }

    #[test]
    fn malformed_lines_are_skipped_and_reported() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("prd_snippets.jsonl");
        let good = serde_json::to_string(&annotated(vec![Extraction::new(
            "decision",
            "adopt DBSCAN",
            Map::new(),
        )]))
        .expect("serialize");
        let unknown_class = serde_json::to_string(&annotated(vec![Extraction::new(
            "project",
            "not a snippet",
            Map::new(),
        )]))
        .expect("serialize");
        fs::write(&path, format!("{{not json\n\n{good}\n{unknown_class}\n")).expect("write");

        let pool = load_snippet_pool(&[path.clone()]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.snippets[0].line_number, 3);
        assert_eq!(pool.report.lines_read, 3);
        assert_eq!(pool.report.skipped.len(), 2);
        assert_eq!(pool.report.skipped_lines(), 1);
        assert_eq!(pool.report.skipped[0].line_number, 1);
        assert!(matches!(
            pool.report.skipped[1].reason,
            SkipReason::InvalidSnippet {
                extraction_index: 0,
                ..
            }
        ));
        assert!(pool.report.skipped[0]
            .reason
            .to_string()
            .starts_with("malformed json: "));
        assert!(pool.report.skipped[1]
            .reason
            .to_string()
            .starts_with("invalid snippet #0: "));
    }

    #[test]
    fn unreadable_files_do_not_stop_the_load() {
        let dir = tempdir().expect("temp dir");
        let missing = dir.path().join("gone_snippets.jsonl");
        let present = dir.path().join("here_snippets.jsonl");
        write_snippet_artifact(
            &present,
            &annotated(vec![Extraction::new("insight", "cs matters", Map::new())]),
        )
        .expect("write");

        let pool = load_snippet_pool(&[missing, present]);
        assert_eq!(pool.report.unreadable_files.len(), 1);
        assert_eq!(pool.report.files_read, 1);
        assert_eq!(pool.documents(), vec!["here"]);
    }

    #[test]
    fn discovery_matches_only_snippet_artifacts_in_name_order() {
        let dir = tempdir().expect("temp dir");
        for name in [
            "weekly_snippets.jsonl",
            "alpha_snippets.jsonl",
            "phase1_summary.json",
            "notes.jsonl",
        ] {
            fs::write(dir.path().join(name), "").expect("write fixture");
        }

        let found = discover_snippet_artifacts(dir.path()).expect("discover");
        let names = found
            .iter()
            .map(|path| path.file_name().expect("name").to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["alpha_snippets.jsonl", "weekly_snippets.jsonl"]);
    }

    #[test]
    fn discovery_fails_fast_without_artifacts() {
        let dir = tempdir().expect("temp dir");
        let err = discover_snippet_artifacts(dir.path()).expect_err("nothing to find");
        assert!(matches!(err, StorageError::NoSnippetArtifacts { .. }));

        let err = discover_snippet_artifacts(&dir.path().join("missing")).expect_err("no dir");
        assert!(matches!(err, StorageError::NoSnippetArtifacts { .. }));
    }

    #[test]
    fn json_documents_round_trip_with_non_ascii_preserved() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested/out.json");
        let value = json!({"summary": "スマートタグ"});
        write_json_pretty(&path, &value).expect("write json");

        let raw = fs::read_to_string(&path).expect("read back");
        assert!(raw.contains("スマートタグ"));
        let parsed: Value = read_json(&path).expect("parse");
        assert_eq!(parsed, value);
    }
}
