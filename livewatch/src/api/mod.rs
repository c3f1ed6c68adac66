//! REST APIハンドラー

/// 通知受付
pub mod callback;

/// エラーレスポンス
pub mod error;

/// 稼働状況参照・ヘルスチェック
pub mod objects;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// ルーターを構築する
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/callback", post(callback::receive_callback))
        .route("/api/objects", get(objects::list_objects))
        .route("/api/objects/:id", get(objects::get_object))
        .route("/health", get(objects::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
