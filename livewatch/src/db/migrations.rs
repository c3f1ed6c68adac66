//! データベース接続とマイグレーション

use crate::common::error::LivenessError;
use crate::config::StoreConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{info, warn};

/// SQLite接続プールを作成する（1回のみ試行）
///
/// ファイルDBの場合は親ディレクトリとファイルを必要に応じて作成する。
pub async fn connect(config: &StoreConfig) -> Result<SqlitePool, LivenessError> {
    let database_url = config.database_url.as_str();
    if !database_url.starts_with("sqlite:") {
        return Err(LivenessError::Config(format!(
            "Unsupported database URL (expected sqlite:): {}",
            database_url
        )));
    }
    let in_memory = is_in_memory(database_url);

    // SQLiteファイルはディレクトリが存在しないと作成できないため、先に作成しておく
    if let Some(db_path) = database_file_path(database_url) {
        let parent = db_path.parent().unwrap_or_else(|| std::path::Path::new(""));
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LivenessError::StoreUnavailable(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let connect_options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| LivenessError::Config(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.operation_timeout());
    if in_memory {
        // インメモリDBは接続ごとに独立し、全接続が閉じると消えるため1接続を保持し続ける
        pool_options = pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    pool_options
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            LivenessError::StoreUnavailable(format!("Failed to connect to database: {}", e))
        })
}

/// 固定間隔で再試行しながら接続する
///
/// `connect_attempts` 回すべて失敗した場合は最後のエラーを返す。
pub async fn connect_with_retry(config: &StoreConfig) -> Result<SqlitePool, LivenessError> {
    let attempts = config.connect_attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect(config).await {
            Ok(pool) => return Ok(pool),
            Err(LivenessError::Config(message)) => return Err(LivenessError::Config(message)),
            Err(e) if attempt < attempts => {
                warn!(
                    attempt,
                    attempts,
                    backoff_secs = config.connect_backoff_secs,
                    error = %e,
                    "Couldn't establish database connection, retrying"
                );
                tokio::time::sleep(config.connect_backoff()).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// マイグレーションを実行（sqlx::migrate!マクロを使用）
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), LivenessError> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| LivenessError::Database(format!("Failed to run migrations: {}", e)))?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// 接続（再試行付き）とマイグレーションをまとめて行う
pub async fn initialize_database(config: &StoreConfig) -> Result<SqlitePool, LivenessError> {
    let pool = connect_with_retry(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn database_file_path(database_url: &str) -> Option<std::path::PathBuf> {
    let path = database_url.strip_prefix("sqlite:")?;
    // `sqlite::memory:` のような特殊指定はスキップ
    if path.starts_with(':') || is_in_memory(database_url) {
        return None;
    }
    // `sqlite://` 形式に備えてスラッシュを除去し、クエリ部分を除外
    let normalized = path.trim_start_matches("//");
    let without_params = normalized.split('?').next().unwrap_or(normalized);
    Some(std::path::PathBuf::from(without_params))
}
