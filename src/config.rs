//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "taskwatch")]
#[command(about = "A persistent per-task work timer engine with an HTTP control surface")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Agent identity recorded in the timer lock
    #[arg(short, long, default_value = "local-agent")]
    pub agent_id: String,

    /// Directory for persisted timer state
    #[arg(short, long, default_value = ".taskwatch")]
    pub data_dir: PathBuf,

    /// Discard persisted timer state older than this many hours
    #[arg(long, default_value = "24")]
    pub stale_hours: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Snapshot staleness window in milliseconds
    pub fn stale_after_ms(&self) -> u64 {
        self.stale_hours * 60 * 60 * 1000
    }
}
