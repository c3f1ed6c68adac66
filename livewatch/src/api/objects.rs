//! 稼働状況参照API

use super::error::AppError;
use crate::common::types::{LivenessRecord, ObjectId};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// GET /api/objects
pub async fn list_objects(
    State(state): State<AppState>,
) -> Result<Json<Vec<LivenessRecord>>, AppError> {
    Ok(Json(state.store.list().await?))
}

/// GET /api/objects/:id
pub async fn get_object(
    State(state): State<AppState>,
    Path(object_id): Path<ObjectId>,
) -> Result<Response, AppError> {
    let response = match state.store.get(object_id).await? {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Object not found" })),
        )
            .into_response(),
    };
    Ok(response)
}

/// GET /health
///
/// ストアが ping に応答すれば `200`、応答しなければ `503`。
pub async fn health(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}
