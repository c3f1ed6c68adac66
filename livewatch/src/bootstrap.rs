//! サーバー初期化ロジック
//!
//! データベース接続、検証クライアント、通知パイプライン、スイーパーなど
//! サーバー起動に必要なコンポーネントの初期化を担当する。

use crate::checker::VerificationClient;
use crate::config::AppConfig;
use crate::db::{migrations, LivenessRepository, SqliteLivenessRepository};
use crate::ingest::IngestPipeline;
use crate::shutdown::ShutdownController;
use crate::sweeper::{EvictionSweeper, SweeperHandle};
use crate::AppState;
use anyhow::Context;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, info_span};

/// サーバー初期化結果
pub struct InitContext {
    /// アプリケーション状態
    pub state: AppState,
    /// 起動済みスイーパー
    pub sweeper: SweeperHandle,
    /// 接続プール（終了時にクローズする）
    pub pool: SqlitePool,
}

/// サーバー初期化を実行する
///
/// ストアに接続できない場合は設定回数まで再試行し、それでも失敗すればエラーを返す。
pub async fn initialize(config: &AppConfig) -> anyhow::Result<InitContext> {
    info!("livewatch v{}", env!("CARGO_PKG_VERSION"));

    let pool = migrations::initialize_database(&config.store)
        .await
        .context("Failed to initialize database")?;
    info!(database_url = %config.store.database_url, "Database ready");

    let store: Arc<dyn LivenessRepository> = Arc::new(
        SqliteLivenessRepository::new(pool.clone())
            .with_operation_timeout(config.store.operation_timeout()),
    );
    let shutdown = ShutdownController::default();

    let verifier = VerificationClient::new(&config.checker)
        .context("Failed to create verification client")?
        .with_span(info_span!("checker"));
    info!(
        checker = verifier.base_url(),
        max_concurrent_probes = config.checker.max_concurrent_probes,
        "Verification client ready"
    );

    let ingest = IngestPipeline::new(verifier, store.clone(), shutdown.clone())
        .with_batch_deadline(config.ingest.batch_deadline())
        .with_span(info_span!("ingest"));

    let sweeper = EvictionSweeper::new(store.clone())
        .with_interval(config.sweeper.interval())
        .with_ttl(config.sweeper.ttl())
        .with_timeout(config.sweeper.timeout())
        .with_span(info_span!("sweeper"))
        .start(&shutdown);

    Ok(InitContext {
        state: AppState {
            ingest,
            store,
            shutdown,
        },
        sweeper,
        pool,
    })
}

impl InitContext {
    /// バックグラウンド処理を停止し、プールを閉じる
    ///
    /// 実行中のバッチとスイープは `grace` まで待ち、残りのバッチはキャンセルする。
    pub async fn shutdown(self, grace: std::time::Duration) {
        let drained = self.state.shutdown.drain(grace).await;
        if !drained {
            tracing::warn!("Some batches were cancelled during shutdown");
        }
        self.sweeper.join().await;
        self.pool.close().await;
        info!("Shutdown complete");
    }
}
