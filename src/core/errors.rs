// src/core/errors.rs

//! Defines the primary error type for the daemon.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the daemon.
#[derive(Error, Debug, Clone)]
pub enum RepguardError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("own node record (id {0}) was not found in the cluster metadata")]
    OwnNodeMissing(i64),

    #[error("database error: {0}")]
    Database(Arc<sqlx::Error>),

    #[error("peer at '{0}' is unreachable")]
    PeerUnreachable(String),

    #[error("local session lost and reconnect failed")]
    LocalSessionLost,

    #[error("promote command exited non-zero (code {0:?})")]
    PromoteCommandFailed(Option<i32>),

    #[error("follow command exited non-zero (code {0:?})")]
    FollowCommandFailed(Option<i32>),

    #[error(
        "no promote_command or service_promote_command configured for automatic failover_mode"
    )]
    MissingPromoteCommand,

    #[error("no follow_command configured for automatic failover_mode")]
    MissingFollowCommand,

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("PID file error: {0}")]
    PidFile(String),

    #[error("refusing to run as root (uid 0)")]
    RunningAsRoot,

    #[error("daemonization failed: {0}")]
    SysFailure(String),
}

impl From<std::io::Error> for RepguardError {
    fn from(e: std::io::Error) -> Self {
        RepguardError::Io(Arc::new(e))
    }
}

impl From<sqlx::Error> for RepguardError {
    fn from(e: sqlx::Error) -> Self {
        RepguardError::Database(Arc::new(e))
    }
}

impl From<toml::de::Error> for RepguardError {
    fn from(e: toml::de::Error) -> Self {
        RepguardError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RepguardError>;

/// Process exit codes, per the CLI contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    ErrBadConfig = 1,
    ErrBadPidfile = 2,
    ErrSysFailure = 3,
}

impl From<&RepguardError> for ExitCode {
    fn from(e: &RepguardError) -> Self {
        match e {
            RepguardError::Config(_)
            | RepguardError::MissingPromoteCommand
            | RepguardError::MissingFollowCommand
            | RepguardError::RunningAsRoot
            | RepguardError::OwnNodeMissing(_) => ExitCode::ErrBadConfig,
            RepguardError::PidFile(_) => ExitCode::ErrBadPidfile,
            RepguardError::SysFailure(_) => ExitCode::ErrSysFailure,
            _ => ExitCode::ErrSysFailure,
        }
    }
}
