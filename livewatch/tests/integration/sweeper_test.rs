//! 期限切れスイーパーの統合テスト

use std::time::Duration;

use chrono::Utc;
use livewatch::common::types::ReconcileBatch;
use livewatch::sweeper::SweeperState;

use crate::support::checker::mock_checker;
use crate::support::service::TestService;

#[tokio::test]
async fn stale_records_are_evicted_and_fresh_ones_survive() {
    let checker = mock_checker(&[]).await;
    let service = TestService::spawn(&checker.uri(), |config| {
        config.sweeper.interval_secs = 1;
    })
    .await;

    let now = Utc::now();
    let store = &service.state().store;
    let stale = ReconcileBatch {
        online: vec![7],
        offline: vec![],
    };
    store
        .reconcile(&stale, now - chrono::Duration::seconds(31))
        .await
        .unwrap();
    let fresh = ReconcileBatch {
        online: vec![8],
        offline: vec![],
    };
    store.reconcile(&fresh, now).await.unwrap();

    let records = service
        .wait_for_records(Duration::from_secs(5), |records| {
            records.iter().all(|r| r.object_id != 7)
        })
        .await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].object_id, 8);

    service.stop().await;
}

#[tokio::test]
async fn offline_records_expire_too() {
    let checker = mock_checker(&[]).await;
    let service = TestService::spawn(&checker.uri(), |config| {
        config.sweeper.interval_secs = 1;
        config.sweeper.ttl_secs = 1;
    })
    .await;

    let store = &service.state().store;
    let seen = ReconcileBatch {
        online: vec![3],
        offline: vec![],
    };
    store.reconcile(&seen, Utc::now()).await.unwrap();
    let gone = ReconcileBatch {
        online: vec![],
        offline: vec![3],
    };
    store.reconcile(&gone, Utc::now()).await.unwrap();

    service
        .wait_for_records(Duration::from_secs(5), |records| records.is_empty())
        .await;

    service.stop().await;
}

#[tokio::test]
async fn sweeper_stops_on_shutdown() {
    let checker = mock_checker(&[]).await;
    let service = TestService::spawn(&checker.uri(), |_| {}).await;
    let mut state = service.sweeper_state();
    assert_eq!(*state.borrow(), SweeperState::Waiting);

    service.stop().await;
    assert_eq!(*state.borrow_and_update(), SweeperState::Stopped);
}
