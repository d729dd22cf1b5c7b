// src/daemon.rs

//! Daemonization and PID file handling: the classic single-fork
//! `fork`/`setsid` daemonization sequence, plus PID-file bookkeeping that
//! refuses to overwrite a file naming a still-alive process.

use crate::core::errors::{RepguardError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use sysinfo::{Pid, System};
use tracing::{info, warn};

/// Forks, detaches from the controlling terminal, forks a second time so the
/// daemon can never reacquire one, and changes the working directory to the
/// config file's directory — the classic double-fork Unix daemonization
/// sequence. Only the final grandchild returns from this function; the
/// original process and the intermediate session leader both exit
/// immediately.
pub fn daemonize(config_file: &str) -> Result<()> {
    // SAFETY: fork() is called before any threads exist in this process
    // (daemonize() runs at the very start of main, ahead of the Tokio
    // runtime), so there is no risk of forking with other threads holding
    // locks this child can never release.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(RepguardError::SysFailure("fork() failed".to_string()));
    }
    if pid > 0 {
        std::process::exit(0);
    }

    // SAFETY: single-threaded child process immediately after fork().
    if unsafe { libc::setsid() } < 0 {
        return Err(RepguardError::SysFailure("setsid() failed".to_string()));
    }

    // Second fork: the session leader from setsid() could still acquire a
    // controlling terminal; forking again and letting it exit prevents that.
    // SAFETY: still single-threaded, immediately after setsid().
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(RepguardError::SysFailure("fork() failed".to_string()));
    }
    if pid > 0 {
        std::process::exit(0);
    }

    let config_dir = Path::new(config_file)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::env::set_current_dir(config_dir).map_err(|e| {
        RepguardError::SysFailure(format!("chdir(\"{}\") failed: {e}", config_dir.display()))
    })?;

    Ok(())
}

/// Refuses to run as root, mirroring repmgrd's own startup check: this
/// daemon runs shell commands on the operator's behalf and has no business
/// doing so with superuser privileges.
pub fn refuse_root() -> Result<()> {
    // SAFETY: getuid() has no preconditions and never fails.
    if unsafe { libc::getuid() } == 0 {
        return Err(RepguardError::RunningAsRoot);
    }
    Ok(())
}

/// Writes `pid` (defaulting to the current process) to `path`, refusing to
/// overwrite a file that names a still-alive process.
pub fn write_pid_file(path: &str) -> Result<()> {
    if let Some(existing) = read_pid_file(path)? {
        let mut system = System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        if system.process(Pid::from_u32(existing)).is_some() {
            return Err(RepguardError::PidFile(format!(
                "PID file {path} names process {existing}, which is still running"
            )));
        }
        warn!(
            "removing stale PID file {} (process {} is gone)",
            path, existing
        );
    }

    let pid = std::process::id();
    let mut file = fs::File::create(path)
        .map_err(|e| RepguardError::PidFile(format!("creating {path}: {e}")))?;
    write!(file, "{pid}").map_err(|e| RepguardError::PidFile(format!("writing {path}: {e}")))?;
    info!("wrote PID file {} ({})", path, pid);
    Ok(())
}

pub fn remove_pid_file(path: &str) {
    if let Err(e) = fs::remove_file(path) {
        warn!("failed to remove PID file {}: {}", path, e);
    }
}

fn read_pid_file(path: &str) -> Result<Option<u32>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| RepguardError::PidFile(format!("reading {path}: {e}")))?;
    Ok(content.trim().parse::<u32>().ok())
}
