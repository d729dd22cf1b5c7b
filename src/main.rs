// src/main.rs

//! The main entry point for the repguard daemon.

use repguard::cli::Cli;
use repguard::config::DaemonConfig;
use repguard::core::failover::FailoverCommands;
use repguard::core::metadata::{MetadataClient, PgMetadataClient};
use repguard::core::model::{NodeInfo, NodeType};
use repguard::core::monitor::{self, Daemon, ReconnectPolicy};
use repguard::{daemon, logging, signals, ExitCode};
use tokio::sync::broadcast;
use tracing::{error, info};

fn main() {
    if let Err(e) = daemon::refuse_root() {
        eprintln!("repguard: {e}");
        std::process::exit(ExitCode::from(&e) as i32);
    }

    let cli = Cli::parse_args();

    let code = match run(cli) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            eprintln!("repguard: {e}");
            ExitCode::from(&e)
        }
    };
    std::process::exit(code as i32);
}

fn run(cli: Cli) -> repguard::Result<()> {
    if cli.daemonize {
        daemon::daemonize(&cli.config_file)?;
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| repguard::RepguardError::SysFailure(e.to_string()))?;
    runtime.block_on(run_async(cli))
}

async fn run_async(cli: Cli) -> repguard::Result<()> {
    let config = DaemonConfig::from_file(&cli.config_file).await?;

    let default_level = cli.log_level.clone().or_else(|| config.log_level.clone());
    let level = match (default_level, cli.verbose) {
        (Some(l), _) => l,
        (None, 0) => "info".to_string(),
        (None, _) => "debug".to_string(),
    };
    let log_handle = logging::init(&format!("repguard={level}"));

    if let Some(pid_file) = &cli.pid_file {
        daemon::write_pid_file(pid_file)?;
    }

    info!("repguard starting for node {} ({})", config.node_id, config.node_name);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let reload_flag = signals::ReloadFlag::new();
    signals::install(shutdown_tx.clone(), reload_flag.clone())
        .map_err(|e| repguard::RepguardError::SysFailure(e.to_string()))?;

    let self_node = NodeInfo::new(
        config.node_id,
        config.node_name.clone(),
        config.conninfo.clone(),
        NodeType::Unknown, // resolved by the monitor loop's first recovery-type check
        config.upstream_node_id,
        config.priority,
        true,
    );

    let commands = FailoverCommands {
        promote_command: config.promote_command.clone(),
        service_promote_command: config.service_promote_command.clone(),
        follow_command: config.follow_command.clone(),
        promote_delay: config.promote_delay,
        primary_notification_timeout: config.primary_notification_timeout,
        primary_notification_poll_interval: config.primary_notification_poll_interval,
    };

    let reconnect = ReconnectPolicy {
        attempts: config.reconnect_attempts,
        interval: config.reconnect_interval,
    };

    let client = PgMetadataClient::new();
    let mut daemon_ctx =
        Daemon::new(client, self_node, commands, reconnect, config.log_status_interval)
            .with_reload_support(monitor::ReloadSupport {
                flag: reload_flag,
                log_handle,
                config_file: cli.config_file.clone(),
            });

    // Resolve the node's actual type from the live server rather than
    // trusting the config file, the way repmgrd itself does at startup.
    resolve_node_type(&mut daemon_ctx).await?;

    let result = monitor::run(&mut daemon_ctx, shutdown_rx).await;

    if let Some(pid_file) = &cli.pid_file {
        daemon::remove_pid_file(pid_file);
    }

    if let Err(e) = &result {
        error!("monitor loop exited with error: {}", e);
    }
    result
}

async fn resolve_node_type(
    daemon_ctx: &mut Daemon<PgMetadataClient>,
) -> repguard::Result<()> {
    let mut session = daemon_ctx.client.connect_peer(&daemon_ctx.self_node.conninfo).await?;

    // The node's own metadata record is the authority for `type` and is the
    // only source that can say Witness/Bdr/Unknown; `get_recovery_type` only
    // ever answers Primary or Standby from a live pg_is_in_recovery() probe.
    let recorded_type = daemon_ctx
        .client
        .get_node_record(&mut session, daemon_ctx.self_node.node_id)
        .await?
        .map(|record| record.node_type);

    daemon_ctx.self_node.node_type = match recorded_type {
        Some(node_type @ (NodeType::Witness | NodeType::Bdr)) => node_type,
        _ => daemon_ctx.client.get_recovery_type(&mut session).await?,
    };

    daemon_ctx.client.close_peer(session).await;
    Ok(())
}
