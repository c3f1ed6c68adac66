//! データベースアクセス層
//!
//! SQLiteベースのデータ永続化

/// データベース接続・マイグレーション
pub mod migrations;

/// 稼働状況レコード操作（照合・期限切れ削除）
pub mod objects;

/// Repository traitパターン（テスタビリティ向上）
pub mod traits;

pub use traits::{LivenessRepository, SqliteLivenessRepository};
