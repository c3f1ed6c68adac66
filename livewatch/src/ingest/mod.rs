//! 通知処理パイプライン
//!
//! 通知されたIDを重複除去し、検証クライアントで確認した結果を
//! 1トランザクションでストアに照合する。処理はバックグラウンドタスクで行い、
//! タスクはシャットダウンコントローラの監督下に置く。

use crate::checker::VerificationClient;
use crate::common::error::{LivenessError, LivenessResult};
use crate::common::types::{dedup_preserving_order, ObjectId, ReconcileBatch, ReconcileReport};
use crate::db::LivenessRepository;
use crate::shutdown::ShutdownController;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// デフォルトのバッチ検証期限（秒）
const DEFAULT_BATCH_DEADLINE_SECS: u64 = 5;

/// 1バッチの処理結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// 受信したID数（重複含む）
    pub received: usize,
    /// 重複除去後にプローブしたID数
    pub probed: usize,
    /// 期限内に結果が得られたID数
    pub verified: usize,
    /// 照合結果
    pub reconcile: ReconcileReport,
}

/// 通知処理パイプライン
#[derive(Clone)]
pub struct IngestPipeline {
    verifier: VerificationClient,
    store: Arc<dyn LivenessRepository>,
    shutdown: ShutdownController,
    batch_deadline: Duration,
    span: Span,
}

impl IngestPipeline {
    /// 新しいパイプラインを作成
    pub fn new(
        verifier: VerificationClient,
        store: Arc<dyn LivenessRepository>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            verifier,
            store,
            shutdown,
            batch_deadline: Duration::from_secs(DEFAULT_BATCH_DEADLINE_SECS),
            span: Span::none(),
        }
    }

    /// バッチ検証の期限を設定
    pub fn with_batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = deadline;
        self
    }

    /// バッチタスクの親スパンを設定
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 通知をバックグラウンドで処理する
    ///
    /// タスクを起動した場合は `Ok(true)`、IDが空で何もしなかった場合は `Ok(false)`。
    /// シャットダウン開始後は [`LivenessError::ShuttingDown`] を返す。
    pub fn dispatch(&self, object_ids: Vec<ObjectId>) -> LivenessResult<bool> {
        if self.shutdown.is_shutdown_requested() {
            return Err(LivenessError::ShuttingDown);
        }
        if object_ids.is_empty() {
            debug!("Empty notification acknowledged");
            return Ok(false);
        }

        let pipeline = self.clone();
        let abort = self.shutdown.abort_token();
        let span = info_span!(
            parent: &self.span,
            "ingest_batch",
            received = object_ids.len()
        );
        let task = async move {
            tokio::select! {
                result = pipeline.process(object_ids) => {
                    if let Err(e) = result {
                        error!(
                            error = %e,
                            transient = e.is_transient(),
                            "Failed to reconcile batch"
                        );
                    }
                }
                _ = abort.cancelled() => {
                    warn!("Batch cancelled during shutdown");
                }
            }
        }
        .instrument(span);

        match self.shutdown.spawn(task) {
            Some(_) => Ok(true),
            None => Err(LivenessError::ShuttingDown),
        }
    }

    /// 1バッチを同期的に処理する
    pub async fn process(&self, object_ids: Vec<ObjectId>) -> LivenessResult<BatchReport> {
        let unique = dedup_preserving_order(&object_ids);
        let deadline = Instant::now() + self.batch_deadline;

        let outcomes = self.verifier.verify(&unique, deadline).await;
        let batch = ReconcileBatch::from_outcomes(outcomes);

        let mut report = BatchReport {
            received: object_ids.len(),
            probed: unique.len(),
            verified: batch.len(),
            reconcile: ReconcileReport::default(),
        };

        if batch.is_empty() {
            info!(
                probed = report.probed,
                "No probe results within deadline, nothing to reconcile"
            );
            return Ok(report);
        }

        report.reconcile = self.store.reconcile(&batch, Utc::now()).await?;

        info!(
            probed = report.probed,
            verified = report.verified,
            inserted = ?report.reconcile.inserted,
            refreshed = ?report.reconcile.refreshed,
            marked_offline = ?report.reconcile.marked_offline,
            "Batch reconciled"
        );
        Ok(report)
    }
}
