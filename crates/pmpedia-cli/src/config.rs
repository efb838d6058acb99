use anyhow::{Context, Result};
use pmpedia_association::{AssociationConfig, KeywordTable};
use pmpedia_core::extraction::DEFAULT_MODEL_ID;
use pmpedia_gemini_adapter::{GeminiConfig, DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
use pmpedia_storage::{ArtifactLayout, DEFAULT_PHASE1_DIR, DEFAULT_PHASE2_DIR};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "pmpedia.toml";
pub const API_KEY_ENV: &str = "LANGEXTRACT_API_KEY";

/// Optional `pmpedia.toml`. Every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub documents: Vec<PathBuf>,
    pub phase1_dir: Option<PathBuf>,
    pub phase2_dir: Option<PathBuf>,
    pub model_id: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
    pub keyword_table: Option<KeywordTable>,
}

/// Values given on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub documents: Vec<PathBuf>,
    pub phase1_dir: Option<PathBuf>,
    pub phase2_dir: Option<PathBuf>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub documents: Vec<PathBuf>,
    pub layout: ArtifactLayout,
    pub model_id: String,
    pub api_base: String,
    pub timeout: Duration,
    pub keyword_table: KeywordTable,
}

impl Settings {
    pub fn association(&self) -> AssociationConfig {
        AssociationConfig {
            keyword_table: self.keyword_table.clone(),
            ..AssociationConfig::default()
        }
    }

    pub fn gemini(&self, api_key: String) -> GeminiConfig {
        GeminiConfig {
            api_key,
            model_id: self.model_id.clone(),
            api_base: self.api_base.clone(),
            timeout: self.timeout,
        }
    }
}

/// An explicit path must exist; the default file is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                return Ok(FileConfig::default());
            }
            default
        }
    };
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_file_config(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

pub fn parse_file_config(contents: &str) -> Result<FileConfig> {
    Ok(toml::from_str(contents)?)
}

pub fn resolve(file: FileConfig, overrides: Overrides) -> Settings {
    let documents = if overrides.documents.is_empty() {
        file.documents
    } else {
        overrides.documents
    };
    let phase1_dir = overrides
        .phase1_dir
        .or(file.phase1_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PHASE1_DIR));
    let phase2_dir = overrides
        .phase2_dir
        .or(file.phase2_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PHASE2_DIR));

    Settings {
        documents,
        layout: ArtifactLayout::new(phase1_dir, phase2_dir),
        model_id: overrides
            .model_id
            .or(file.model_id)
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
        api_base: file
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        timeout: Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        keyword_table: file.keyword_table.unwrap_or_default(),
    }
}

/// Blank values count as missing.
pub fn require_api_key(value: Option<String>) -> Result<String> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => anyhow::bail!("{API_KEY_ENV} is not set; export it or add it to .env"),
    }
}
