//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use crate::common::error::LivenessError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{debug, error};

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub LivenessError);

impl From<LivenessError> for AppError {
    fn from(err: LivenessError) -> Self {
        AppError(err)
    }
}

impl AppError {
    /// エラーに対応するHTTPステータス
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            // 通知元との互換性のため、パース失敗は 500 で応答する
            LivenessError::MalformedNotification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LivenessError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            LivenessError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LivenessError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            LivenessError::Database(_) | LivenessError::Config(_) | LivenessError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        // 詳細はログのみに出力し、クライアントには external_message() を返す
        if status.is_server_error() && !matches!(self.0, LivenessError::ShuttingDown) {
            error!(error = %self.0, status = status.as_u16(), "Request failed");
        } else {
            debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }

        let payload = json!({
            "error": self.0.external_message()
        });

        (status, Json(payload)).into_response()
    }
}
