// src/cli.rs

//! Command-line parsing, via `clap`'s derive API.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "repguard", version, about = "Monitoring and automated-failover daemon for primary/standby replication clusters")]
pub struct Cli {
    /// Path to the daemon's TOML configuration file.
    #[arg(short = 'f', long = "config-file")]
    pub config_file: String,

    /// Detach and run in the background.
    #[arg(short = 'd', long = "daemonize")]
    pub daemonize: bool,

    /// Path to the PID file to write once started (required with -d).
    #[arg(short = 'p', long = "pid-file")]
    pub pid_file: Option<String>,

    /// Overrides the configured log level (e.g. "info", "debug").
    #[arg(short = 'L', long = "log-level")]
    pub log_level: Option<String>,

    /// Increases log verbosity by one step; repeatable.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Enables writing monitoring history events to the metadata database.
    #[arg(short = 'm', long = "monitoring-history")]
    pub monitoring_history: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
