//! Configuration management
//!
//! Settings are layered as: built-in defaults, an optional TOML file, environment
//! variables (with fallback to the deprecated deployment names), then CLI flags.

use crate::common::error::LivenessError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Config files probed when no explicit path is given (first match wins).
pub const DEFAULT_CONFIG_FILES: &[&str] = &["livewatch.toml", "config/livewatch.toml"];

/// A problem noticed while reading environment overrides
///
/// The environment is read before the tracing subscriber exists, so these are
/// collected and logged by the caller once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvWarning {
    /// Only the deprecated variable name was set
    Deprecated {
        /// Deprecated name that was used
        old_name: String,
        /// Name to use instead
        new_name: String,
    },
    /// The value could not be parsed and was ignored
    Unparsable {
        /// Variable that held the value
        variable: String,
        /// Raw value
        value: String,
    },
}

impl EnvWarning {
    /// Emit this warning through `tracing`
    pub fn log(&self) {
        match self {
            EnvWarning::Deprecated { old_name, new_name } => tracing::warn!(
                "Environment variable '{}' is deprecated, use '{}' instead",
                old_name,
                new_name
            ),
            EnvWarning::Unparsable { variable, value } => tracing::warn!(
                variable = %variable,
                value = %value,
                "Ignoring unparsable environment variable"
            ),
        }
    }
}

impl std::fmt::Display for EnvWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvWarning::Deprecated { old_name, new_name } => write!(
                f,
                "environment variable '{}' is deprecated, use '{}' instead",
                old_name, new_name
            ),
            EnvWarning::Unparsable { variable, value } => write!(
                f,
                "ignoring unparsable environment variable {}={:?}",
                variable, value
            ),
        }
    }
}

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and records a deprecation warning.
pub fn get_env_with_fallback(
    new_name: &str,
    old_name: &str,
    warnings: &mut Vec<EnvWarning>,
) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        warnings.push(EnvWarning::Deprecated {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        });
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Unparsable values are ignored and recorded as warnings.
pub fn get_env_with_fallback_parse<T: FromStr>(
    new_name: &str,
    old_name: &str,
    warnings: &mut Vec<EnvWarning>,
) -> Option<T> {
    let raw = get_env_with_fallback(new_name, old_name, warnings)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            let variable = if std::env::var_os(new_name).is_some() {
                new_name
            } else {
                old_name
            };
            warnings.push(EnvWarning::Unparsable {
                variable: variable.to_string(),
                value: raw,
            });
            None
        }
    }
}

fn override_from_env<T: FromStr>(
    target: &mut T,
    new_name: &str,
    old_name: &str,
    warnings: &mut Vec<EnvWarning>,
) {
    if let Some(value) = get_env_with_fallback_parse(new_name, old_name, warnings) {
        *target = value;
    }
}

/// HTTPサーバー設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 待ち受けアドレス（ポート必須）
    pub listen_address: String,
    /// グレースフルシャットダウンで処理中バッチを待つ秒数
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9090".to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// シャットダウン猶予
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// 外部チェッカー設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// チェッカーのベースアドレス（スキーム省略時は http）
    pub base_url: String,
    /// プローブ1件あたりのタイムアウト（秒）
    pub probe_timeout_secs: u64,
    /// プロセス全体で同時に実行するプローブの上限
    pub max_concurrent_probes: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            base_url: "127.0.0.1:9010".to_string(),
            // チェッカーの最大応答時間は約4秒、往復分の余裕を加える
            probe_timeout_secs: 5,
            max_concurrent_probes: 64,
        }
    }
}

impl CheckerConfig {
    /// スキームを補完し末尾の `/` を除いたベースURL
    pub fn normalized_base_url(&self) -> String {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        }
    }

    /// プローブのタイムアウト
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// 通知処理設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 1バッチの検証全体に与える期限（秒）
    pub batch_deadline_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_deadline_secs: 5,
        }
    }
}

impl IngestConfig {
    /// バッチ検証の期限
    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_secs)
    }
}

/// データベース設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// データベースURL
    pub database_url: String,
    /// 接続プールの最大接続数
    pub max_connections: u32,
    /// 照合・スイープ以外の個別操作および接続取得のタイムアウト（秒）
    pub operation_timeout_secs: u64,
    /// 起動時の接続試行回数
    pub connect_attempts: u32,
    /// 起動時の再試行間隔（秒）
    pub connect_backoff_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/livewatch.db".to_string(),
            max_connections: 8,
            operation_timeout_secs: 5,
            connect_attempts: 3,
            connect_backoff_secs: 5,
        }
    }
}

impl StoreConfig {
    /// 照合トランザクションの期限
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// 起動時の再試行間隔
    pub fn connect_backoff(&self) -> Duration {
        Duration::from_secs(self.connect_backoff_secs)
    }
}

/// 期限切れスイーパー設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// スイープ間隔（秒）
    pub interval_secs: u64,
    /// `last_seen` の有効期間（秒）
    pub ttl_secs: u64,
    /// 1回のスイープトランザクションの期限（秒）
    pub timeout_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            ttl_secs: 30,
            timeout_secs: 5,
        }
    }
}

impl SweeperConfig {
    /// スイープ間隔
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// `last_seen` の有効期間
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// スイープトランザクションの期限
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// ログ出力形式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 1行1JSON
    #[default]
    Json,
    /// コンソール向けの整形表示
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// ログ設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// ログレベル（`RUST_LOG` が優先）
    pub level: String,
    /// コンソール出力形式
    pub format: LogFormat,
    /// JSONログの追記先ファイル
    pub path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            path: None,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTPサーバー
    pub server: ServerConfig,
    /// 外部チェッカー
    pub checker: CheckerConfig,
    /// 通知処理
    pub ingest: IngestConfig,
    /// データベース
    pub store: StoreConfig,
    /// 期限切れスイーパー
    pub sweeper: SweeperConfig,
    /// ログ
    pub log: LogConfig,
}

impl AppConfig {
    /// 設定ファイルと環境変数から読み込む
    ///
    /// `path` が指定された場合そのファイルは必須、未指定なら
    /// [`DEFAULT_CONFIG_FILES`] のうち最初に存在するものを読む。
    /// CLIフラグの適用前なので検証はしない。呼び出し側が最後に [`AppConfig::validate`] を呼ぶ。
    /// 環境変数の警告はロギング初期化後に出力できるよう一緒に返す。
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<EnvWarning>), LivenessError> {
        let mut config = Self::from_file(path)?;
        let warnings = config.apply_env();
        Ok((config, warnings))
    }

    /// 設定ファイルのみを読み込む（環境変数は適用しない）
    pub fn from_file(path: Option<&Path>) -> Result<Self, LivenessError> {
        let mut builder = config::Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(found) = DEFAULT_CONFIG_FILES
                    .iter()
                    .map(Path::new)
                    .find(|candidate| candidate.is_file())
                {
                    builder = builder.add_source(config::File::from(found).required(false));
                }
            }
        }

        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<AppConfig>())
            .map_err(|e| LivenessError::Config(e.to_string()))
    }

    /// 環境変数で上書きし、読み取り時の警告を返す
    pub fn apply_env(&mut self) -> Vec<EnvWarning> {
        let mut warnings = Vec::new();
        override_from_env(
            &mut self.server.listen_address,
            "LIVEWATCH_LISTEN_ADDRESS",
            "SERVER_LISTEN_ADDRESS",
            &mut warnings,
        );
        override_from_env(
            &mut self.server.shutdown_timeout_secs,
            "LIVEWATCH_SHUTDOWN_TIMEOUT_SECS",
            "SERVER_SHUTDOWN_TIMEOUT",
            &mut warnings,
        );
        override_from_env(
            &mut self.checker.base_url,
            "LIVEWATCH_CHECKER_URL",
            "CLIENT_TESTER_SERVICE_ADDRESS",
            &mut warnings,
        );
        override_from_env(
            &mut self.checker.probe_timeout_secs,
            "LIVEWATCH_PROBE_TIMEOUT_SECS",
            "CLIENT_PROBE_TIMEOUT",
            &mut warnings,
        );
        override_from_env(
            &mut self.checker.max_concurrent_probes,
            "LIVEWATCH_MAX_CONCURRENT_PROBES",
            "CLIENT_MAX_CONCURRENT_PROBES",
            &mut warnings,
        );
        override_from_env(
            &mut self.ingest.batch_deadline_secs,
            "LIVEWATCH_BATCH_DEADLINE_SECS",
            "BATCH_DEADLINE_SECS",
            &mut warnings,
        );
        override_from_env(
            &mut self.store.database_url,
            "LIVEWATCH_DATABASE_URL",
            "DATABASE_URL",
            &mut warnings,
        );
        override_from_env(
            &mut self.store.max_connections,
            "LIVEWATCH_DB_MAX_CONNECTIONS",
            "DATABASE_MAX_CONNECTIONS",
            &mut warnings,
        );
        override_from_env(
            &mut self.store.operation_timeout_secs,
            "LIVEWATCH_DB_TIMEOUT_SECS",
            "DATABASE_TIMEOUT_SECS",
            &mut warnings,
        );
        override_from_env(
            &mut self.store.connect_attempts,
            "LIVEWATCH_DB_CONNECT_ATTEMPTS",
            "DATABASE_CONNECT_ATTEMPTS",
            &mut warnings,
        );
        override_from_env(
            &mut self.store.connect_backoff_secs,
            "LIVEWATCH_DB_CONNECT_BACKOFF_SECS",
            "DATABASE_CONNECT_BACKOFF_SECS",
            &mut warnings,
        );
        override_from_env(
            &mut self.sweeper.interval_secs,
            "LIVEWATCH_SWEEP_INTERVAL_SECS",
            "SWEEP_INTERVAL_SECS",
            &mut warnings,
        );
        override_from_env(
            &mut self.sweeper.ttl_secs,
            "LIVEWATCH_TTL_SECS",
            "TTL_SECS",
            &mut warnings,
        );
        override_from_env(
            &mut self.sweeper.timeout_secs,
            "LIVEWATCH_SWEEP_TIMEOUT_SECS",
            "SWEEP_TIMEOUT_SECS",
            &mut warnings,
        );
        override_from_env(
            &mut self.log.level,
            "LIVEWATCH_LOG_LEVEL",
            "LOG_LEVEL",
            &mut warnings,
        );
        override_from_env(
            &mut self.log.format,
            "LIVEWATCH_LOG_FORMAT",
            "LOG_FORMAT",
            &mut warnings,
        );
        if let Some(path) = get_env_with_fallback("LIVEWATCH_LOG_PATH", "LOG_PATH", &mut warnings)
        {
            self.log.path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        warnings
    }

    /// 値の整合性を検証する
    pub fn validate(&self) -> Result<(), LivenessError> {
        let zero_checks = [
            ("checker.probe_timeout_secs", self.checker.probe_timeout_secs),
            ("ingest.batch_deadline_secs", self.ingest.batch_deadline_secs),
            ("store.operation_timeout_secs", self.store.operation_timeout_secs),
            ("sweeper.interval_secs", self.sweeper.interval_secs),
            ("sweeper.ttl_secs", self.sweeper.ttl_secs),
            ("sweeper.timeout_secs", self.sweeper.timeout_secs),
        ];
        if let Some((name, _)) = zero_checks.iter().find(|(_, value)| *value == 0) {
            return Err(LivenessError::Config(format!("{} must be positive", name)));
        }
        if self.checker.max_concurrent_probes == 0 {
            return Err(LivenessError::Config(
                "checker.max_concurrent_probes must be positive".into(),
            ));
        }
        if self.store.max_connections == 0 || self.store.connect_attempts == 0 {
            return Err(LivenessError::Config(
                "store.max_connections and store.connect_attempts must be positive".into(),
            ));
        }
        if self.server.listen_address.trim().is_empty() {
            return Err(LivenessError::Config(
                "server.listen_address must not be empty".into(),
            ));
        }
        Ok(())
    }
}
