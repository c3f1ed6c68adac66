//! 通知受付API
//!
//! `POST /callback`

use super::error::AppError;
use crate::common::error::LivenessError;
use crate::common::protocol::CallbackRequest;
use crate::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode};
use tracing::{debug, warn};

/// POST /callback
///
/// ボディを解釈してバッチを投入した時点で `200` を返す。検証と照合はバックグラウンドで行う。
/// ボディが解釈できない場合は処理せず `500`、シャットダウン開始後は `503`。
pub async fn receive_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request: CallbackRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Failed to parse notification body");
        LivenessError::MalformedNotification(e.to_string())
    })?;

    let dispatched = state.ingest.dispatch(request.object_ids)?;
    debug!(dispatched, "Notification accepted");
    Ok(StatusCode::OK)
}
