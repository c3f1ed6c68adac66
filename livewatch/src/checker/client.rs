use crate::common::error::LivenessError;
use crate::common::protocol::ObjectStatusResponse;
use crate::common::types::{ObjectId, VerificationOutcome};
use crate::config::CheckerConfig;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, warn, Instrument, Span};

/// 1件のプローブの失敗理由
#[derive(Debug, Error)]
pub enum ProbeError {
    /// プローブ単位のタイムアウト
    #[error("probe timed out")]
    Timeout,
    /// 接続失敗などの通信エラー
    #[error("transport error: {0}")]
    Transport(String),
    /// 2xx以外の応答
    #[error("unexpected status {0}")]
    Status(u16),
    /// 応答ボディが解釈できない
    #[error("malformed response body: {0}")]
    Decode(String),
    /// 応答の `id` が要求したIDと一致しない
    #[error("response id {actual} does not match requested id {expected}")]
    Mismatch {
        /// 要求したID
        expected: ObjectId,
        /// 応答に含まれていたID
        actual: ObjectId,
    },
    /// 同時実行ゲートが閉じられた
    #[error("concurrency gate closed")]
    Closed,
}

impl ProbeError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// 検証クライアント
///
/// クローンしても同時実行ゲートは共有されるため、プロセス全体で
/// 実行中のプローブ数は `max_concurrent_probes` を超えない。
#[derive(Clone)]
pub struct VerificationClient {
    client: Client,
    base_url: String,
    limiter: Arc<Semaphore>,
    span: Span,
}

impl VerificationClient {
    /// 設定からクライアントを作成
    pub fn new(config: &CheckerConfig) -> Result<Self, LivenessError> {
        let client = Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .map_err(|e| LivenessError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.normalized_base_url(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_probes.max(1))),
            span: Span::none(),
        })
    }

    /// プローブタスクの親スパンを設定
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 正規化済みのチェッカーベースURL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 現在取得可能な同時実行枠の数
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// 全IDを並行にプローブし、期限までに得られた結果を返す
    ///
    /// 失敗したプローブと期限切れで中断したプローブは結果に含まれない。
    /// 結果の順序は完了順。
    pub async fn verify(&self, ids: &[ObjectId], deadline: Instant) -> Vec<VerificationOutcome> {
        if ids.is_empty() {
            return Vec::new();
        }

        let mut probes = JoinSet::new();
        for &object_id in ids {
            let checker = self.clone();
            probes.spawn(
                async move {
                    let result = checker.probe_gated(object_id).await;
                    (object_id, result)
                }
                .instrument(self.span.clone()),
            );
        }

        let mut outcomes = Vec::with_capacity(ids.len());
        loop {
            match tokio::time::timeout_at(deadline, probes.join_next()).await {
                Ok(Some(Ok((object_id, Ok(online))))) => {
                    debug!(object_id, online, "Probe completed");
                    outcomes.push(VerificationOutcome { object_id, online });
                }
                Ok(Some(Ok((object_id, Err(e))))) => {
                    warn!(object_id, error = %e, "Probe failed, dropping object from batch");
                }
                Ok(Some(Err(e))) => {
                    error!(error = %e, "Probe task join error");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = probes.len(),
                        completed = outcomes.len(),
                        "Batch deadline elapsed, aborting outstanding probes"
                    );
                    probes.abort_all();
                    break;
                }
            }
        }

        outcomes
    }

    async fn probe_gated(&self, object_id: ObjectId) -> Result<bool, ProbeError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProbeError::Closed)?;
        self.probe(object_id).await
    }

    /// 1件プローブする（同時実行ゲートを経由しない）
    pub async fn probe(&self, object_id: ObjectId) -> Result<bool, ProbeError> {
        let url = format!("{}/objects/{}", self.base_url, object_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ProbeError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let body: ObjectStatusResponse = response.json().await.map_err(ProbeError::from_reqwest)?;
        if body.id != object_id {
            return Err(ProbeError::Mismatch {
                expected: object_id,
                actual: body.id,
            });
        }
        Ok(body.online)
    }
}
