//! 共通型定義

/// エラー型
pub mod error;

/// 通信プロトコル（通知・チェッカー応答）
pub mod protocol;

/// ドメイン型
pub mod types;
