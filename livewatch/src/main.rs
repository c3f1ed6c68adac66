//! livewatch Server Entry Point

use anyhow::Context;
use clap::Parser;
use livewatch::cli::Cli;
use livewatch::config::AppConfig;
use livewatch::{bootstrap, logging, server};
use tracing::error;

#[tokio::main]
async fn main() {
    let args = Cli::parse().serve_args();

    let (mut config, env_warnings) = match AppConfig::load(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    args.apply_to(&mut config);
    if let Err(e) = config.validate() {
        for warning in &env_warnings {
            eprintln!("Warning: {}", warning);
        }
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // ガードはプロセス終了まで保持する
    let _log_guard = match logging::init(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            std::process::exit(1);
        }
    };
    for warning in &env_warnings {
        warning.log();
    }

    if let Err(e) = run(config).await {
        error!(error = %format!("{:#}", e), "livewatch terminated with error");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let ctx = bootstrap::initialize(&config)
        .await
        .context("Startup failed")?;

    let result = server::run(ctx.state.clone(), &config.server.listen_address).await;
    ctx.shutdown(config.server.shutdown_timeout()).await;
    result
}
