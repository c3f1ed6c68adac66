//! 期限切れレコードのスイーパー
//!
//! 一定間隔で `last_seen` がTTLより古いレコードを削除する。
//! 失敗はログに残して次の周期で再試行する。

use crate::common::error::{LivenessError, LivenessResult};
use crate::common::types::ObjectId;
use crate::db::LivenessRepository;
use crate::shutdown::ShutdownController;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument, Span};

/// デフォルトのスイープ間隔（秒）
const DEFAULT_INTERVAL_SECS: u64 = 30;

/// デフォルトのTTL（秒）
const DEFAULT_TTL_SECS: u64 = 30;

/// デフォルトのスイープ期限（秒）
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// スイーパーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    /// 次の周期を待機中
    Waiting,
    /// 削除トランザクション実行中
    Sweeping,
    /// 停止済み
    Stopped,
}

/// 起動済みスイーパーのハンドル
pub struct SweeperHandle {
    state: watch::Receiver<SweeperState>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// 現在の状態
    pub fn state(&self) -> SweeperState {
        *self.state.borrow()
    }

    /// 状態変化を購読する
    pub fn subscribe(&self) -> watch::Receiver<SweeperState> {
        self.state.clone()
    }

    /// ループの終了を待つ
    pub async fn join(self) {
        let Some(join) = self.join else {
            return;
        };
        if let Err(e) = join.await {
            error!(error = %e, "Sweeper task join error");
        }
    }
}

/// 期限切れスイーパー
pub struct EvictionSweeper {
    store: Arc<dyn LivenessRepository>,
    interval: Duration,
    ttl: Duration,
    timeout: Duration,
    span: Span,
}

impl EvictionSweeper {
    /// 新しいスイーパーを作成
    pub fn new(store: Arc<dyn LivenessRepository>) -> Self {
        Self {
            store,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            span: Span::none(),
        }
    }

    /// スイープ間隔を設定
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// TTLを設定
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// 1回のスイープの期限を設定
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// ループのスパンを設定
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 1回スイープし、削除したIDを返す
    pub async fn sweep_once(&self) -> LivenessResult<Vec<ObjectId>> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| LivenessError::Config(format!("Invalid TTL: {}", e)))?;
        let cutoff = Utc::now() - ttl;

        tokio::time::timeout(self.timeout, self.store.evict_stale(cutoff))
            .await
            .map_err(|_| {
                LivenessError::Timeout(format!("Sweep did not finish within {:?}", self.timeout))
            })?
    }

    /// バックグラウンドで開始
    ///
    /// ループは `shutdown` の監督下のタスクとして起動し、`drain` の待機対象になる。
    /// シャットダウン要求で待機中のループが終了する。実行中のスイープは完了を待つ。
    /// シャットダウン要求後に呼ばれた場合は起動せず、停止済みのハンドルを返す。
    pub fn start(self, shutdown: &ShutdownController) -> SweeperHandle {
        let (tx, rx) = watch::channel(SweeperState::Waiting);
        let cancel = shutdown.shutdown_token();
        let span = self.span.clone();
        match shutdown.spawn(self.run(cancel, tx).instrument(span)) {
            Some(join) => SweeperHandle {
                state: rx,
                join: Some(join),
            },
            None => SweeperHandle {
                state: watch::channel(SweeperState::Stopped).1,
                join: None,
            },
        }
    }

    async fn run(self, cancel: CancellationToken, state: watch::Sender<SweeperState>) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 初回のtickは即時に発火するため読み捨てる
        timer.tick().await;

        info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Eviction sweeper started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            state.send_replace(SweeperState::Sweeping);
            match self.sweep_once().await {
                Ok(deleted) if deleted.is_empty() => debug!("No stale objects"),
                Ok(deleted) => info!(
                    count = deleted.len(),
                    object_ids = ?deleted,
                    "Deleted not seen objects"
                ),
                Err(e) => error!(error = %e, "Sweep failed"),
            }
            state.send_replace(SweeperState::Waiting);
        }

        state.send_replace(SweeperState::Stopped);
        info!("Eviction sweeper stopped");
    }
}
