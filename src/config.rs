// src/config.rs

//! Loads and validates the daemon's TOML configuration file: per-node
//! identity, failover commands, and the configurable reconnect/notification
//! timing budgets.

use crate::core::errors::{RepguardError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Top-level daemon configuration, as loaded from the file named by `-f`.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub node_id: i64,
    pub node_name: String,
    pub conninfo: String,

    #[serde(default)]
    pub upstream_node_id: Option<i64>,

    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default)]
    pub failover_mode: FailoverMode,

    pub promote_command: Option<String>,
    pub service_promote_command: Option<String>,
    pub follow_command: Option<String>,

    #[serde(with = "humantime_serde", default = "default_promote_delay")]
    pub promote_delay: Duration,

    #[serde(with = "humantime_serde", default = "default_log_status_interval")]
    pub log_status_interval: Duration,

    #[serde(with = "humantime_serde", default = "default_primary_notification_timeout")]
    pub primary_notification_timeout: Duration,

    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub primary_notification_poll_interval: Duration,

    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(with = "humantime_serde", default = "default_reconnect_interval")]
    pub reconnect_interval: Duration,

    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub monitoring_history: bool,
}

/// Whether the daemon acts on a lost election automatically or merely logs
/// and waits for an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailoverMode {
    #[default]
    Automatic,
    Manual,
}

fn default_priority() -> i32 {
    100
}

fn default_promote_delay() -> Duration {
    Duration::from_secs(0)
}

fn default_log_status_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_primary_notification_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_reconnect_attempts() -> u32 {
    6
}

fn default_reconnect_interval() -> Duration {
    Duration::from_secs(10)
}

impl DaemonConfig {
    pub async fn from_file(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RepguardError::Config(format!("reading {path}: {e}")))?;
        let config: DaemonConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.conninfo.trim().is_empty() {
            return Err(RepguardError::Config(
                "conninfo must not be empty".to_string(),
            ));
        }
        if self.failover_mode == FailoverMode::Automatic
            && self.promote_command.is_none()
            && self.service_promote_command.is_none()
        {
            return Err(RepguardError::MissingPromoteCommand);
        }
        if self.failover_mode == FailoverMode::Automatic && self.follow_command.is_none() {
            return Err(RepguardError::MissingFollowCommand);
        }
        Ok(())
    }
}
