use chrono::{DateTime, Utc};
use pmpedia_core::project_contracts::UnifiedInformationSnippet;
use pmpedia_core::snippet_contracts::{InformationSnippet, SourcedSnippet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Matches kept per project; applied before content deduplication.
pub const MAX_ASSOCIATED_SNIPPETS: usize = 20;

/// Curated expansion table: when a project name contains a label, every
/// synonym of that label becomes a keyword as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable(BTreeMap<String, Vec<String>>);

impl KeywordTable {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_entries<I, L, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (L, Vec<S>)>,
        L: Into<String>,
        S: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(label, synonyms)| {
                    (label.into(), synonyms.into_iter().map(Into::into).collect())
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::from_entries([
            (
                "スマートタグ",
                vec![
                    "スマートタグ",
                    "smarttag",
                    "smart tag",
                    "タグ",
                    "クラスタリング",
                    "ハルシネーション",
                ],
            ),
            (
                "マルチデータソース",
                vec![
                    "マルチデータソース",
                    "multi data source",
                    "データソース",
                    "csv",
                    "取り込み",
                ],
            ),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct AssociationConfig {
    pub keyword_table: KeywordTable,
    pub max_snippets: usize,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            keyword_table: KeywordTable::default(),
            max_snippets: MAX_ASSOCIATED_SNIPPETS,
        }
    }
}

pub struct KeywordAssociator {
    config: AssociationConfig,
}

impl KeywordAssociator {
    pub fn new(config: AssociationConfig) -> Self {
        Self { config }
    }

    /// Lower-cased keyword set for a project, in first-seen order.
    pub fn keywords_for(&self, project_name: &str, aliases: &[String]) -> Vec<String> {
        let project_lower = project_name.to_lowercase();
        let mut keywords = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |value: &str| {
            // A blank keyword would match every snippet. Padding is kept.
            if value.trim().is_empty() {
                return;
            }
            let value = value.to_lowercase();
            if seen.insert(value.clone()) {
                keywords.push(value);
            }
        };

        push(project_name);
        for alias in aliases {
            push(alias);
        }
        for (label, synonyms) in self.config.keyword_table.iter() {
            if label.trim().is_empty() || !project_lower.contains(&label.to_lowercase()) {
                continue;
            }
            for synonym in synonyms {
                push(synonym);
            }
        }

        keywords
    }

    /// Scans the pool in order, keeps the first `max_snippets` matches, then
    /// drops repeated contents.
    pub fn associate(
        &self,
        project_name: &str,
        aliases: &[String],
        pool: &[SourcedSnippet],
        timestamp: DateTime<Utc>,
    ) -> Vec<UnifiedInformationSnippet> {
        let keywords = self.keywords_for(project_name, aliases);
        if keywords.is_empty() {
            return Vec::new();
        }

        let matched = pool
            .iter()
            .filter(|sourced| snippet_matches(&sourced.snippet, &keywords))
            .take(self.config.max_snippets);

        let mut seen_content = HashSet::new();
        let mut out = Vec::new();
        for sourced in matched {
            if !seen_content.insert(sourced.snippet.content.as_str()) {
                continue;
            }
            out.push(UnifiedInformationSnippet {
                content: sourced.snippet.content.clone(),
                source_document_name: sourced.source_document.clone(),
                timestamp,
                category: sourced.snippet.category,
            });
        }
        out
    }
}

/// Free-function form of [`KeywordAssociator::associate`] with the default
/// cap.
pub fn associate(
    project_name: &str,
    aliases: &[String],
    pool: &[SourcedSnippet],
    keyword_table: &KeywordTable,
    timestamp: DateTime<Utc>,
) -> Vec<UnifiedInformationSnippet> {
    KeywordAssociator::new(AssociationConfig {
        keyword_table: keyword_table.clone(),
        max_snippets: MAX_ASSOCIATED_SNIPPETS,
    })
    .associate(project_name, aliases, pool, timestamp)
}

/// `keywords` must already be lower-cased. Content is a substring match;
/// tagged project keywords must match exactly.
pub fn snippet_matches(snippet: &InformationSnippet, keywords: &[String]) -> bool {
    let content = snippet.content.to_lowercase();
    if keywords
        .iter()
        .any(|keyword| content.contains(keyword.as_str()))
    {
        return true;
    }

    snippet
        .project_keywords
        .iter()
        .map(|tag| tag.to_lowercase())
        .any(|tag| keywords.iter().any(|keyword| *keyword == tag))
}
