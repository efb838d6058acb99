use pmpedia_core::extraction::{ExampleData, Extraction};
use pmpedia_core::project_contracts::{
    ATTR_ALIASES, ATTR_KEY_THEMES, ATTR_PROJECT_ID, ATTR_STATUS, ATTR_SUMMARY, PROJECT_CLASS,
};
use pmpedia_core::snippet_contracts::{SnippetCategory, ATTR_PEOPLE, ATTR_PROJECT_KEYWORDS};
use pmpedia_core::triage_contracts::{
    TRIAGE_CLASS_DOCUMENT_TYPE, TRIAGE_CLASS_RELEVANCE_SCORE, TRIAGE_CLASS_SUMMARY,
};
use serde_json::{json, Map, Value};

fn extraction(class: &str, text: &str, attributes: Value) -> Extraction {
    let attributes = match attributes {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Extraction::new(class, text, attributes)
}

fn triage(document_type: &str, score: &str, summary: &str) -> Vec<Extraction> {
    vec![
        extraction(TRIAGE_CLASS_DOCUMENT_TYPE, document_type, Value::Null),
        extraction(TRIAGE_CLASS_RELEVANCE_SCORE, score, Value::Null),
        extraction(TRIAGE_CLASS_SUMMARY, summary, Value::Null),
    ]
}

fn snippet(category: SnippetCategory, text: &str, keywords: &[&str], people: &[&str]) -> Extraction {
    extraction(
        category.prompt_label(),
        text,
        json!({ ATTR_PROJECT_KEYWORDS: keywords, ATTR_PEOPLE: people }),
    )
}

/// One work document that clears the gate and one personal note that does
/// not.
pub fn triage_examples() -> Vec<ExampleData> {
    vec![
        ExampleData {
            text: "週次レビュー 8/18-8/22\n\
                   スマートタグ機能のPRDを完成させた。田中さんとクラスタリング手法を議論し、DBSCANで進めることにした。\n\
                   来週はエンジニアチームとの見積もりMTG。"
                .to_string(),
            extractions: triage(
                "週次レビュー",
                "0.9",
                "スマートタグ機能のPRD完成とクラスタリング手法の決定を報告する週次レビュー。",
            ),
        },
        ExampleData {
            text: "土曜日。買い物に行った。夜は映画を観てゆっくり過ごした。".to_string(),
            extractions: triage(
                "個人的なメモ",
                "0.1",
                "休日の過ごし方を記録した私的なメモ。",
            ),
        },
    ]
}

pub fn snippet_examples() -> Vec<ExampleData> {
    vec![
        ExampleData {
            text: "スマートタグ機能のPRDを完成させた。\n\
                   田中さんとクラスタリング手法を議論し、DBSCANで進めることにした。\n\
                   タグ生成でハルシネーションが起きる懸念がある。\n\
                   来週、エンジニアチームと見積もりMTGを設定する。"
                .to_string(),
            extractions: vec![
                snippet(
                    SnippetCategory::Progress,
                    "スマートタグ機能のPRDを完成させた",
                    &["スマートタグ", "PRD"],
                    &[],
                ),
                snippet(
                    SnippetCategory::Decision,
                    "田中さんとクラスタリング手法を議論し、DBSCANで進めることにした",
                    &["スマートタグ", "クラスタリング"],
                    &["田中"],
                ),
                snippet(
                    SnippetCategory::Risk,
                    "タグ生成でハルシネーションが起きる懸念がある",
                    &["スマートタグ"],
                    &[],
                ),
                snippet(
                    SnippetCategory::NextAction,
                    "来週、エンジニアチームと見積もりMTGを設定する",
                    &["スマートタグ"],
                    &["エンジニアチーム"],
                ),
            ],
        },
        ExampleData {
            text: "CSV取り込みで文字化けが発生している。\n\
                   顧客はデータソースを横断して検索したいと考えていることが分かった。"
                .to_string(),
            extractions: vec![
                snippet(
                    SnippetCategory::Issue,
                    "CSV取り込みで文字化けが発生している",
                    &["マルチデータソース", "CSV"],
                    &[],
                ),
                snippet(
                    SnippetCategory::Insight,
                    "顧客はデータソースを横断して検索したいと考えていることが分かった",
                    &["マルチデータソース"],
                    &[],
                ),
            ],
        },
    ]
}

pub fn integration_examples() -> Vec<ExampleData> {
    vec![ExampleData {
        text: "[Document: 週次レビュー]\n\
               - 進捗報告: \"スマートタグ機能のPRDを完成させた\"\n\
               - 決定事項: \"smarttagのクラスタリングはDBSCANで進める\"\n\
               [Document: 議事録]\n\
               - 課題: \"CSV取り込みで文字化けが発生している\""
            .to_string(),
        extractions: vec![
            extraction(
                PROJECT_CLASS,
                "スマートタグ機能",
                json!({
                    ATTR_PROJECT_ID: "proj_001",
                    ATTR_ALIASES: ["smarttag", "タグクラスタリング"],
                    ATTR_STATUS: "順調",
                    ATTR_SUMMARY: "PRDが完成し、クラスタリング手法はDBSCANに決定した。",
                    ATTR_KEY_THEMES: ["PRD", "クラスタリング"],
                    ATTR_PEOPLE: [],
                }),
            ),
            extraction(
                PROJECT_CLASS,
                "マルチデータソース対応",
                json!({
                    ATTR_PROJECT_ID: "proj_002",
                    ATTR_ALIASES: ["CSV取り込み"],
                    ATTR_STATUS: "要確認",
                    ATTR_SUMMARY: "CSV取り込みの文字化けが未解決。",
                    ATTR_KEY_THEMES: ["CSV", "文字コード"],
                    ATTR_PEOPLE: [],
                }),
            ),
        ],
    }]
}
