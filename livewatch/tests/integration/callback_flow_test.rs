//! 通知受付から照合までのエンドツーエンドテスト

use std::time::Duration;

use chrono::Utc;
use livewatch::common::types::{encode_timestamp, ReconcileBatch};
use reqwest::StatusCode;

use crate::support::checker::{mock_checker, mount_status};
use crate::support::service::TestService;

#[tokio::test]
async fn notification_reconciles_online_and_offline_objects() {
    let checker = mock_checker(&[(1, true), (2, false), (3, true)]).await;
    let service = TestService::spawn(&checker.uri(), |_| {}).await;

    // 2 は既存レコード（オンライン）
    let seeded_at = Utc::now() - chrono::Duration::seconds(10);
    let seed = ReconcileBatch {
        online: vec![2],
        offline: vec![],
    };
    service.state().store.reconcile(&seed, seeded_at).await.unwrap();

    let response = service.post_callback(r#"{"object_ids":[1,1,2,3]}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    let records = service
        .wait_for_records(Duration::from_secs(5), |records| records.len() == 3)
        .await;
    let summary: Vec<_> = records.iter().map(|r| (r.object_id, r.online)).collect();
    assert_eq!(summary, vec![(1, true), (2, false), (3, true)]);

    // オフライン確認では last_seen を更新しない
    let offline = records.iter().find(|r| r.object_id == 2).unwrap();
    assert_eq!(encode_timestamp(offline.last_seen), encode_timestamp(seeded_at));
    assert!(records[0].last_seen > seeded_at);

    // 重複したIDは1回だけプローブされる
    let probes = checker.received_requests().await.unwrap();
    assert_eq!(probes.len(), 3);

    service.stop().await;
}

#[tokio::test]
async fn malformed_notification_is_rejected_without_processing() {
    let checker = mock_checker(&[(1, true)]).await;
    let service = TestService::spawn(&checker.uri(), |_| {}).await;

    let response = service.post_callback("object_ids=1").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Internal Server Error");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(checker.received_requests().await.unwrap().is_empty());
    assert!(service.state().store.list().await.unwrap().is_empty());

    service.stop().await;
}

#[tokio::test]
async fn empty_notification_is_acknowledged() {
    let checker = mock_checker(&[]).await;
    let service = TestService::spawn(&checker.uri(), |_| {}).await;
    // スイーパーのループも監督下のタスクとして数えられる
    let baseline = service.state().shutdown.in_flight();

    let response = service.post_callback(r#"{"object_ids":[]}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.state().shutdown.in_flight(), baseline);

    service.stop().await;
}

#[tokio::test]
async fn slow_probe_leaves_record_untouched() {
    let checker = mock_checker(&[(1, true)]).await;
    mount_status(&checker, 5, false, Duration::from_secs(3)).await;
    let service = TestService::spawn(&checker.uri(), |config| {
        config.ingest.batch_deadline_secs = 1;
    })
    .await;

    let seeded_at = Utc::now() - chrono::Duration::seconds(5);
    let seed = ReconcileBatch {
        online: vec![5],
        offline: vec![],
    };
    service.state().store.reconcile(&seed, seeded_at).await.unwrap();

    let response = service.post_callback(r#"{"object_ids":[5,1]}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    let records = service
        .wait_for_records(Duration::from_secs(5), |records| {
            records.iter().any(|r| r.object_id == 1)
        })
        .await;
    let untouched = records.iter().find(|r| r.object_id == 5).unwrap();
    assert!(untouched.online);
    assert_eq!(encode_timestamp(untouched.last_seen), encode_timestamp(seeded_at));

    service.stop().await;
}

#[tokio::test]
async fn unreachable_checker_writes_nothing() {
    let service = TestService::spawn("127.0.0.1:1", |config| {
        config.checker.probe_timeout_secs = 1;
        config.ingest.batch_deadline_secs = 1;
    })
    .await;

    let response = service.post_callback(r#"{"object_ids":[1,2]}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(service.state().store.list().await.unwrap().is_empty());

    service.stop().await;
}
