//! serve サブコマンド
//!
//! 稼働状況トラッカーを起動します。

use crate::config::{AppConfig, LogFormat};
use clap::Args;
use std::path::PathBuf;

/// serve サブコマンドの引数
///
/// 指定したフラグは設定ファイル・環境変数より優先される。
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:9090
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Checker base address
    #[arg(long)]
    pub checker_url: Option<String>,

    /// Database URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// Log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Console log format (json | pretty)
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

impl ServeArgs {
    /// 指定されたフラグで設定を上書きする
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(listen) = &self.listen {
            config.server.listen_address = listen.clone();
        }
        if let Some(url) = &self.checker_url {
            config.checker.base_url = url.clone();
        }
        if let Some(url) = &self.database_url {
            config.store.database_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
    }
}
