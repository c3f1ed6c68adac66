use std::net::SocketAddr;
use std::time::Duration;

use livewatch::bootstrap::{self, InitContext};
use livewatch::common::types::LivenessRecord;
use livewatch::config::AppConfig;
use livewatch::sweeper::SweeperState;
use livewatch::{server, AppState};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// 実際にバインドしたlivewatchサーバー
#[allow(dead_code)]
pub struct TestService {
    addr: SocketAddr,
    ctx: InitContext,
    server: JoinHandle<anyhow::Result<()>>,
    client: reqwest::Client,
    _dir: TempDir,
}

/// チェッカーURLを差し替えた設定（DBは一時ディレクトリのファイル）
#[allow(dead_code)]
pub fn test_config(dir: &TempDir, checker_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.listen_address = "127.0.0.1:0".to_string();
    config.checker.base_url = checker_url.to_string();
    config.store.database_url = format!("sqlite:{}", dir.path().join("livewatch.db").display());
    config.store.connect_attempts = 1;
    config
}

#[allow(dead_code)]
impl TestService {
    /// 設定を調整してサーバーを起動する
    pub async fn spawn(checker_url: &str, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = test_config(&dir, checker_url);
        tweak(&mut config);

        let ctx = bootstrap::initialize(&config)
            .await
            .expect("Failed to initialize livewatch");
        let listener = TcpListener::bind(&config.server.listen_address)
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(server::serve(ctx.state.clone(), listener));

        Self {
            addr,
            ctx,
            server,
            client: reqwest::Client::new(),
            _dir: dir,
        }
    }

    pub fn sweeper_state(&self) -> tokio::sync::watch::Receiver<SweeperState> {
        self.ctx.sweeper.subscribe()
    }

    pub fn state(&self) -> &AppState {
        &self.ctx.state
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// `POST /callback` に生のボディを送る
    pub async fn post_callback(&self, body: &str) -> reqwest::Response {
        self.client
            .post(self.url("/callback"))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("callback request failed")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// 条件を満たすまでストアをポーリングする
    pub async fn wait_for_records<F>(&self, timeout: Duration, mut predicate: F) -> Vec<LivenessRecord>
    where
        F: FnMut(&[LivenessRecord]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let records = self.state().store.list().await.expect("list failed");
            if predicate(&records) {
                return records;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("condition not met within {:?}, records: {:?}", timeout, records);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// サーバーを停止し、バックグラウンド処理を終了させる
    pub async fn stop(self) {
        self.ctx.state.shutdown.request_shutdown();
        let _ = self.server.await;
        self.ctx.shutdown(Duration::from_secs(2)).await;
    }
}
