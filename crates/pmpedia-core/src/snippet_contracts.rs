use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::extraction::Extraction;
use crate::ContractError;

pub const ATTR_PROJECT_KEYWORDS: &str = "project_keywords";
pub const ATTR_PEOPLE: &str = "people";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SnippetCategory {
    Issue,
    Decision,
    Risk,
    Progress,
    Insight,
    NextAction,
}

impl SnippetCategory {
    pub const ALL: [SnippetCategory; 6] = [
        Self::Issue,
        Self::Decision,
        Self::Risk,
        Self::Progress,
        Self::Insight,
        Self::NextAction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Decision => "decision",
            Self::Risk => "risk",
            Self::Progress => "progress",
            Self::Insight => "insight",
            Self::NextAction => "next_action",
        }
    }

    /// Label the prompts and few-shot examples use for this category.
    pub fn prompt_label(self) -> &'static str {
        match self {
            Self::Issue => "課題",
            Self::Decision => "決定事項",
            Self::Risk => "リスク",
            Self::Progress => "進捗報告",
            Self::Insight => "気づき・インサイト",
            Self::NextAction => "ネクストアクション",
        }
    }
}

impl fmt::Display for SnippetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnippetCategory {
    type Err = ContractError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if let Some(category) = Self::ALL
            .into_iter()
            .find(|category| category.prompt_label() == trimmed)
        {
            return Ok(category);
        }
        // Shortened insight label seen in service output.
        if trimmed == "気づき" || trimmed == "インサイト" {
            return Ok(Self::Insight);
        }

        let normalized = trimmed.to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "issue" | "issues" | "problem" => Ok(Self::Issue),
            "decision" | "decisions" => Ok(Self::Decision),
            "risk" | "risks" => Ok(Self::Risk),
            "progress" | "progress_report" => Ok(Self::Progress),
            "insight" | "insights" => Ok(Self::Insight),
            "next_action" | "next_actions" | "todo" => Ok(Self::NextAction),
            _ => Err(ContractError::UnknownCategory {
                label: trimmed.to_string(),
            }),
        }
    }
}

/// A verbatim span pulled out of one document, validated at the service
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InformationSnippet {
    pub content: String,
    #[serde(rename = "type")]
    pub category: SnippetCategory,
    #[serde(default)]
    pub mentioned_people: Vec<String>,
    #[serde(default)]
    pub project_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl InformationSnippet {
    pub fn from_extraction(extraction: &Extraction) -> Result<Self, ContractError> {
        let category = extraction.extraction_class.parse::<SnippetCategory>()?;
        if extraction.extraction_text.trim().is_empty() {
            return Err(ContractError::EmptyExtractionText {
                class: extraction.extraction_class.clone(),
            });
        }

        let extra = extraction
            .attributes
            .iter()
            .filter(|(key, _)| key.as_str() != ATTR_PROJECT_KEYWORDS && key.as_str() != ATTR_PEOPLE)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            content: extraction.extraction_text.clone(),
            category,
            mentioned_people: extraction.string_list_attr(ATTR_PEOPLE),
            project_keywords: extraction.string_list_attr(ATTR_PROJECT_KEYWORDS),
            extra,
        })
    }
}

/// A snippet in the cross-document pool, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedSnippet {
    pub source_document: String,
    pub line_number: usize,
    pub snippet: InformationSnippet,
}

/// Per-class counts, keyed by the raw extraction class.
pub fn counts_by_class(extractions: &[Extraction]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for extraction in extractions {
        *counts
            .entry(extraction.extraction_class.clone())
            .or_insert(0usize) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn extraction(class: &str, text: &str, attributes: Value) -> Extraction {
        let attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Extraction::new(class, text, attributes)
    }

    #[test]
    fn category_accepts_prompt_labels_and_english_names() {
        assert_eq!("課題".parse::<SnippetCategory>().ok(), Some(SnippetCategory::Issue));
        assert_eq!(
            "気づき・インサイト".parse::<SnippetCategory>().ok(),
            Some(SnippetCategory::Insight)
        );
        assert_eq!(
            "Next Action".parse::<SnippetCategory>().ok(),
            Some(SnippetCategory::NextAction)
        );
        assert!(matches!(
            "project".parse::<SnippetCategory>(),
            Err(ContractError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn snippet_from_extraction_splits_known_attributes() {
        let snippet = InformationSnippet::from_extraction(&extraction(
            "進捗報告",
            "スマートタグ機能のPRDを完成させた",
            json!({
                "project_keywords": ["スマートタグ", "PRD"],
                "people": [],
                "confidence": "high"
            }),
        ))
        .expect("valid snippet");

        assert_eq!(snippet.category, SnippetCategory::Progress);
        assert_eq!(snippet.project_keywords, vec!["スマートタグ", "PRD"]);
        assert!(snippet.mentioned_people.is_empty());
        assert_eq!(snippet.extra.get("confidence"), Some(&json!("high")));
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = InformationSnippet::from_extraction(&extraction("risk", "  ", Value::Null))
            .expect_err("blank text");
        assert!(matches!(err, ContractError::EmptyExtractionText { .. }));
    }

    #[test]
    fn counts_group_by_raw_class() {
        let extractions = vec![
            extraction("課題", "a", Value::Null),
            extraction("課題", "b", Value::Null),
            extraction("リスク", "c", Value::Null),
        ];
        let counts = counts_by_class(&extractions);
        assert_eq!(counts.get("課題"), Some(&2));
        assert_eq!(counts.get("リスク"), Some(&1));
    }
}
