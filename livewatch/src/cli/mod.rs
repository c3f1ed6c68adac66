//! CLI module for livewatch
//!
//! Provides the command-line interface for the liveness tracker.

/// `serve` subcommand arguments
pub mod serve;

use clap::{Parser, Subcommand};

/// livewatch - tracks which objects are currently online
#[derive(Parser, Debug)]
#[command(name = "livewatch")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    LIVEWATCH_LISTEN_ADDRESS       Listen address (default: 0.0.0.0:9090)
    LIVEWATCH_CHECKER_URL          Checker base address (default: 127.0.0.1:9010)
    LIVEWATCH_DATABASE_URL         Database URL (default: sqlite:data/livewatch.db)
    LIVEWATCH_TTL_SECS             Seconds before an unseen object is evicted (default: 30)
    LIVEWATCH_LOG_LEVEL            Log level (default: info)
    LIVEWATCH_LOG_FORMAT           Console log format: json | pretty (default: json)
    LIVEWATCH_LOG_PATH             Optional JSON log file

    SERVER_LISTEN_ADDRESS, CLIENT_TESTER_SERVICE_ADDRESS and DATABASE_URL
    are still accepted but deprecated.
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the liveness tracker (default)
    Serve(serve::ServeArgs),
}

impl Cli {
    /// Arguments for `serve`, falling back to defaults when no subcommand was given.
    pub fn serve_args(self) -> serve::ServeArgs {
        match self.command {
            Some(Commands::Serve(args)) => args,
            None => serve::ServeArgs::default(),
        }
    }
}
