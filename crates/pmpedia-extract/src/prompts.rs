//! Prompt descriptions sent with each service call.
//!
//! Labels named here must stay in sync with the parsers in `pmpedia-core`:
//! the triage classes, the snippet category labels and the project
//! attribute keys.

pub const TRIAGE_PROMPT: &str = "\
文書を読み、次の3項目を抽出してください。
- document_type: 週次レビュー / 技術仕様書 / 議事録 / 日報 / 個人的なメモ / その他 のいずれか
- relevance_score: プロジェクト管理上の有用度を 0.0 から 1.0 の数値で
- summary: 文書全体の要約を1〜2文で
各項目は1回だけ出力してください。";

pub const SNIPPET_PROMPT: &str = "\
プロジェクト管理に役立つ記述を原文のまま抜き出し、次のいずれかに分類してください。
課題 / 決定事項 / リスク / 進捗報告 / 気づき・インサイト / ネクストアクション
言い換えや要約はせず、原文の表現を保ってください。
attributes には次を含めてください。
- project_keywords: 関連するプロジェクト名や機能名のリスト
- people: 記述に登場する人物名のリスト
プロジェクトと無関係な私的な記述は抽出しないでください。";

pub const INTEGRATION_PROMPT: &str = "\
複数の文書から抽出されたスニペット一覧を読み、言及されているプロジェクトを統合してください。
表記ゆれや略称で同じ対象を指すものは1つのプロジェクトにまとめ、別名を aliases に記録してください。
各プロジェクトを extraction_class \"project\" として出力し、extraction_text には正式名を入れてください。
attributes には次を含めてください。
- project_id: proj_001 形式の識別子
- aliases: 別名のリスト
- status: 順調 / 停滞 / 要確認 / 完了 / 不明 のいずれか
- summary: 現状の要約
- key_themes: 主要テーマのリスト
- people: 関係者のリスト";
