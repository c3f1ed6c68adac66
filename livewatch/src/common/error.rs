//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use thiserror::Error;

/// livewatch error type
#[derive(Debug, Error)]
pub enum LivenessError {
    /// Store could not be reached (pool exhausted, ping failed)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Database error (begin/query/commit failure, constraint violation)
    #[error("Database error: {0}")]
    Database(String),

    /// Operation exceeded its deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Notification body could not be parsed
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// Shutdown has begun; no new work is accepted
    #[error("Shutting down")]
    ShuttingDown,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LivenessError {
    /// Returns a safe error message for external clients.
    ///
    /// Full details (paths, SQL errors) are only written to server logs.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "Store unavailable",
            Self::Database(_) => "Database error",
            Self::Timeout(_) => "Request timeout",
            Self::MalformedNotification(_) => "Internal Server Error",
            Self::ShuttingDown => "Service shutting down",
            Self::Config(_) => "Configuration error",
            Self::Internal(_) => "Internal server error",
        }
    }

    /// Returns true when retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Timeout(_))
    }
}

impl From<sqlx::Error> for LivenessError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::StoreUnavailable(err.to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

/// Result alias
pub type LivenessResult<T> = Result<T, LivenessError>;
