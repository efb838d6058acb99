use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive lower bound on the relevance score for snippet extraction.
pub const RELEVANCE_THRESHOLD: f64 = 0.7;

pub const TRIAGE_CLASS_DOCUMENT_TYPE: &str = "document_type";
pub const TRIAGE_CLASS_RELEVANCE_SCORE: &str = "relevance_score";
pub const TRIAGE_CLASS_SUMMARY: &str = "summary";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    WeeklyReview,
    TechnicalSpec,
    MeetingMinutes,
    DailyReport,
    PersonalMemo,
    Other,
    Unknown,
}

impl Default for DocumentType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WeeklyReview => "weekly_review",
            Self::TechnicalSpec => "technical_spec",
            Self::MeetingMinutes => "meeting_minutes",
            Self::DailyReport => "daily_report",
            Self::PersonalMemo => "personal_memo",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "weekly_review" | "週次レビュー" => Ok(Self::WeeklyReview),
            "technical_spec" | "technical_specification" | "prd" | "技術仕様書" => {
                Ok(Self::TechnicalSpec)
            }
            "meeting_minutes" | "minutes" | "議事録" => Ok(Self::MeetingMinutes),
            "daily_report" | "日報" => Ok(Self::DailyReport),
            "personal_memo" | "personal_note" | "個人的なメモ" => Ok(Self::PersonalMemo),
            "other" | "その他" => Ok(Self::Other),
            "unknown" | "不明" => Ok(Self::Unknown),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageResult {
    pub document_type: DocumentType,
    pub relevance_score: f64,
    pub summary: String,
}

impl TriageResult {
    pub fn passes_gate(&self) -> bool {
        passes_relevance_gate(self.relevance_score)
    }
}

pub fn passes_relevance_gate(score: f64) -> bool {
    score >= RELEVANCE_THRESHOLD
}
