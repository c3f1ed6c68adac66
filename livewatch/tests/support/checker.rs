use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 指定したIDに固定の判定を返すチェッカーのモックを起動する
#[allow(dead_code)]
pub async fn mock_checker(statuses: &[(i32, bool)]) -> MockServer {
    let server = MockServer::start().await;
    for &(id, online) in statuses {
        mount_status(&server, id, online, Duration::ZERO).await;
    }
    server
}

/// 1件分の応答を登録する（`delay` だけ遅延させる）
#[allow(dead_code)]
pub async fn mount_status(server: &MockServer, id: i32, online: bool, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/objects/{}", id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": id, "online": online }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}
