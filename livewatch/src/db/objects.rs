//! 稼働状況レコードのデータベース操作
//!
//! 照合（オンラインのupsert＋オフラインの更新）と期限切れ削除は、それぞれ専用の
//! 接続とトランザクションで実行する。いずれかの手順で失敗した場合は全体をロールバックする。

use crate::common::error::LivenessError;
use crate::common::types::{
    decode_timestamp, encode_timestamp, LivenessRecord, ObjectId, ReconcileBatch,
    ReconcileReport,
};
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Sqlite, SqlitePool, Transaction};
use tracing::warn;

#[derive(sqlx::FromRow)]
struct ObjectRow {
    object_id: i32,
    online: bool,
    last_seen: String,
}

impl TryFrom<ObjectRow> for LivenessRecord {
    type Error = LivenessError;

    fn try_from(row: ObjectRow) -> Result<Self, Self::Error> {
        let last_seen = decode_timestamp(&row.last_seen).map_err(|e| {
            LivenessError::Database(format!(
                "Invalid last_seen for object {}: {}",
                row.object_id, e
            ))
        })?;
        Ok(Self {
            object_id: row.object_id,
            online: row.online,
            last_seen,
        })
    }
}

/// プールから接続を取得し、疎通を確認する
async fn acquire_live_connection(
    pool: &SqlitePool,
) -> Result<PoolConnection<Sqlite>, LivenessError> {
    let mut conn = pool.acquire().await.map_err(|e| {
        LivenessError::StoreUnavailable(format!("Failed to acquire connection from pool: {}", e))
    })?;
    conn.ping()
        .await
        .map_err(|e| LivenessError::StoreUnavailable(format!("Failed to ping database: {}", e)))?;
    Ok(conn)
}

/// トランザクションをロールバックする（失敗はログのみ）
async fn rollback_quietly(tx: Transaction<'_, Sqlite>, operation: &'static str) {
    if let Err(e) = tx.rollback().await {
        warn!(operation, error = %e, "Failed to rollback transaction");
    }
}

/// バッチを1トランザクションで照合する
///
/// 1. 接続取得と疎通確認
/// 2. `online` を upsert（`online = 1`, `last_seen = now`）
/// 3. 既存レコードのみ `offline` を `online = 0` に更新（`last_seen` は維持）
/// 4. コミット
pub async fn reconcile(
    pool: &SqlitePool,
    batch: &ReconcileBatch,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, LivenessError> {
    let mut conn = acquire_live_connection(pool).await?;
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| LivenessError::Database(format!("Failed to begin transaction: {}", e)))?;

    match apply_batch(&mut tx, batch, now).await {
        Ok(report) => {
            tx.commit().await.map_err(|e| {
                LivenessError::Database(format!("Failed to commit transaction: {}", e))
            })?;
            Ok(report)
        }
        Err(e) => {
            rollback_quietly(tx, "reconcile").await;
            Err(e)
        }
    }
}

async fn apply_batch(
    tx: &mut Transaction<'_, Sqlite>,
    batch: &ReconcileBatch,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, LivenessError> {
    let last_seen = encode_timestamp(now);
    let mut report = ReconcileReport::default();

    for &object_id in &batch.online {
        // 先に UPDATE して書き込みロックを取得し、存在有無で挿入/更新を判別する
        let refreshed = sqlx::query(
            "UPDATE objects SET online = 1, last_seen = ? WHERE object_id = ?",
        )
        .bind(&last_seen)
        .bind(object_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            LivenessError::Database(format!("Failed to refresh object {}: {}", object_id, e))
        })?;

        if refreshed.rows_affected() > 0 {
            report.refreshed.push(object_id);
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO objects (object_id, online, last_seen)
            VALUES (?, 1, ?)
            ON CONFLICT(object_id) DO UPDATE SET
                online = 1,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(object_id)
        .bind(&last_seen)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            LivenessError::Database(format!("Failed to insert object {}: {}", object_id, e))
        })?;
        report.inserted.push(object_id);
    }

    for &object_id in &batch.offline {
        let marked = sqlx::query("UPDATE objects SET online = 0 WHERE object_id = ?")
            .bind(object_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                LivenessError::Database(format!(
                    "Failed to mark object {} offline: {}",
                    object_id, e
                ))
            })?;
        if marked.rows_affected() > 0 {
            report.marked_offline.push(object_id);
        }
    }

    Ok(report)
}

/// `last_seen <= cutoff` のレコードを削除し、削除したIDを返す
pub async fn evict_stale(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<ObjectId>, LivenessError> {
    let mut conn = acquire_live_connection(pool).await?;
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| LivenessError::Database(format!("Failed to begin transaction: {}", e)))?;

    let deleted = sqlx::query_scalar::<_, i32>(
        "DELETE FROM objects WHERE last_seen <= ? RETURNING object_id",
    )
    .bind(encode_timestamp(cutoff))
    .fetch_all(&mut *tx)
    .await;

    match deleted {
        Ok(mut ids) => {
            tx.commit().await.map_err(|e| {
                LivenessError::Database(format!("Failed to commit transaction: {}", e))
            })?;
            ids.sort_unstable();
            Ok(ids)
        }
        Err(e) => {
            rollback_quietly(tx, "evict_stale").await;
            Err(LivenessError::Database(format!(
                "Failed to delete not seen objects: {}",
                e
            )))
        }
    }
}

/// IDでレコードを取得
pub async fn get_object(
    pool: &SqlitePool,
    object_id: ObjectId,
) -> Result<Option<LivenessRecord>, LivenessError> {
    let row = sqlx::query_as::<_, ObjectRow>(
        "SELECT object_id, online, last_seen FROM objects WHERE object_id = ?",
    )
    .bind(object_id)
    .fetch_optional(pool)
    .await?;

    row.map(LivenessRecord::try_from).transpose()
}

/// レコード一覧を取得（ID順）
pub async fn list_objects(pool: &SqlitePool) -> Result<Vec<LivenessRecord>, LivenessError> {
    let rows = sqlx::query_as::<_, ObjectRow>(
        "SELECT object_id, online, last_seen FROM objects ORDER BY object_id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(LivenessRecord::try_from).collect()
}

/// 疎通確認
pub async fn ping(pool: &SqlitePool) -> Result<(), LivenessError> {
    acquire_live_connection(pool).await.map(|_| ())
}
