//! 統合テスト用ユーティリティ

pub mod checker;
pub mod service;
