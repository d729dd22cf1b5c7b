// src/core/shell.rs

//! Runs the operator-supplied promote/follow commands. The daemon never
//! interprets their output: only the exit status decides whether the action
//! succeeded.
//! contract with these commands.

use std::collections::HashMap;
use tokio::process::Command;
use tracing::{debug, warn};

/// Substitutes `%p`, `%n`, `%f` placeholders the way repmgr's own
/// `promote_command`/`follow_command` templates do: `%p` is the new
/// primary's conninfo, `%n` its node id, `%f` the follow node's own id.
pub fn expand_placeholders(template: &str, vars: &HashMap<char, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            if let Some(&next) = chars.peek() {
                if let Some(value) = vars.get(&next) {
                    out.push_str(value);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Runs `command_line` through `/bin/sh -c`, returning the process exit code
/// (`None` if the process was killed by a signal).
pub async fn run_command(command_line: &str) -> std::io::Result<Option<i32>> {
    debug!("running shell command: {}", command_line);
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg(command_line)
        .status()
        .await?;
    if !status.success() {
        warn!(
            "command exited with status {:?}: {}",
            status.code(),
            command_line
        );
    }
    Ok(status.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_placeholders_substitutes_known_vars() {
        let mut vars = HashMap::new();
        vars.insert('p', "host=primary2".to_string());
        vars.insert('n', "3".to_string());
        let out = expand_placeholders("pg_ctl promote -D %p node=%n unknown=%z", &vars);
        assert_eq!(out, "pg_ctl promote -D host=primary2 node=3 unknown=%z");
    }

    #[tokio::test]
    async fn run_command_reports_exit_code() {
        let code = run_command("exit 7").await.unwrap();
        assert_eq!(code, Some(7));
    }

    #[tokio::test]
    async fn run_command_reports_success() {
        let code = run_command("true").await.unwrap();
        assert_eq!(code, Some(0));
    }
}
