//! 通信プロトコル定義
//!
//! 通知元（notifier）からのコールバックと、外部チェッカーの応答形式

use serde::{Deserialize, Serialize};

use super::types::ObjectId;

/// `POST /callback` のリクエストボディ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    /// 通知されたオブジェクトID（重複あり）
    pub object_ids: Vec<ObjectId>,
}

/// `GET /objects/{id}` のレスポンスボディ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatusResponse {
    /// オブジェクトID
    pub id: ObjectId,
    /// オンラインかどうか
    pub online: bool,
}
