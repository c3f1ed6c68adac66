//! Repository traitパターン定義
//!
//! DB操作を抽象化し、通知処理やスイーパーをストアなしでテストできるようにする。
//! 各メソッドは `objects` モジュールのフリー関数に対応する。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;

use crate::common::error::{LivenessError, LivenessResult};
use crate::common::types::{LivenessRecord, ObjectId, ReconcileBatch, ReconcileReport};

use super::objects;

/// 稼働状況ストアのRepository trait
#[async_trait]
pub trait LivenessRepository: Send + Sync {
    /// バッチを1トランザクションで照合する（全件成功か全件未適用）
    async fn reconcile(
        &self,
        batch: &ReconcileBatch,
        now: DateTime<Utc>,
    ) -> LivenessResult<ReconcileReport>;
    /// `last_seen <= cutoff` のレコードを削除し、削除したIDを返す
    async fn evict_stale(&self, cutoff: DateTime<Utc>) -> LivenessResult<Vec<ObjectId>>;
    /// IDでレコードを取得
    async fn get(&self, object_id: ObjectId) -> LivenessResult<Option<LivenessRecord>>;
    /// レコード一覧を取得
    async fn list(&self) -> LivenessResult<Vec<LivenessRecord>>;
    /// 疎通確認
    async fn ping(&self) -> LivenessResult<()>;
}

/// SQLite実装
#[derive(Clone)]
pub struct SqliteLivenessRepository {
    pool: SqlitePool,
    operation_timeout: Duration,
}

impl SqliteLivenessRepository {
    /// 新しいリポジトリを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            operation_timeout: Duration::from_secs(5),
        }
    }

    /// 照合・取得操作の期限を設定
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// 内部の接続プール
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> LivenessResult<T>
    where
        F: Future<Output = LivenessResult<T>> + Send,
    {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| {
                LivenessError::Timeout(format!(
                    "{} did not finish within {:?}",
                    operation, self.operation_timeout
                ))
            })?
    }
}

#[async_trait]
impl LivenessRepository for SqliteLivenessRepository {
    async fn reconcile(
        &self,
        batch: &ReconcileBatch,
        now: DateTime<Utc>,
    ) -> LivenessResult<ReconcileReport> {
        self.bounded("reconcile", objects::reconcile(&self.pool, batch, now))
            .await
    }

    // スイーパーが自身の期限で包むため、ここでは期限を設けない
    async fn evict_stale(&self, cutoff: DateTime<Utc>) -> LivenessResult<Vec<ObjectId>> {
        objects::evict_stale(&self.pool, cutoff).await
    }

    async fn get(&self, object_id: ObjectId) -> LivenessResult<Option<LivenessRecord>> {
        self.bounded("get", objects::get_object(&self.pool, object_id))
            .await
    }

    async fn list(&self) -> LivenessResult<Vec<LivenessRecord>> {
        self.bounded("list", objects::list_objects(&self.pool)).await
    }

    async fn ping(&self) -> LivenessResult<()> {
        self.bounded("ping", objects::ping(&self.pool)).await
    }
}
