//! 参照APIとヘルスチェックの統合テスト

use chrono::Utc;
use livewatch::common::types::ReconcileBatch;
use reqwest::StatusCode;
use serde_json::Value;

use crate::support::checker::mock_checker;
use crate::support::service::TestService;

#[tokio::test]
async fn health_reports_ok_while_store_is_reachable() {
    let checker = mock_checker(&[]).await;
    let service = TestService::spawn(&checker.uri(), |_| {}).await;

    let response = service.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    service.stop().await;
}

#[tokio::test]
async fn objects_can_be_listed_and_fetched() {
    let checker = mock_checker(&[]).await;
    let service = TestService::spawn(&checker.uri(), |_| {}).await;
    let batch = ReconcileBatch {
        online: vec![10, 11],
        offline: vec![],
    };
    service
        .state()
        .store
        .reconcile(&batch, Utc::now())
        .await
        .unwrap();

    let list: Value = service.get("/api/objects").await.json().await.unwrap();
    let ids: Vec<i64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["object_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![10, 11]);

    let one = service.get("/api/objects/11").await;
    assert_eq!(one.status(), StatusCode::OK);
    let body: Value = one.json().await.unwrap();
    assert_eq!(body["online"], true);

    let missing = service.get("/api/objects/12").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let invalid = service.get("/api/objects/abc").await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    service.stop().await;
}
