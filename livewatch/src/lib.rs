//! livewatch
//!
//! 通知されたオブジェクトの稼働状況を外部チェッカーで確認し、
//! SQLiteに保持するサービス。一定期間確認されないレコードは削除する。

#![warn(missing_docs)]

/// REST APIハンドラー
pub mod api;

/// サーバー初期化
pub mod bootstrap;

/// 外部チェッカーへの検証クライアント
pub mod checker;

/// CLIインターフェース
pub mod cli;

/// 共通型定義
pub mod common;

/// 設定管理
pub mod config;

/// データベースアクセス
pub mod db;

/// 通知処理パイプライン
pub mod ingest;

/// ロギング初期化
pub mod logging;

/// axumサーバー起動・シャットダウン
pub mod server;

/// Cooperative shutdown controller
pub mod shutdown;

/// 期限切れスイーパー
pub mod sweeper;

use std::sync::Arc;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// 通知処理パイプライン
    pub ingest: ingest::IngestPipeline,
    /// 稼働状況ストア
    pub store: Arc<dyn db::LivenessRepository>,
    /// Cooperative shutdown controller
    pub shutdown: shutdown::ShutdownController,
}
