// src/core/monitor.rs

//! The Monitor Loop: the per-node task that watches a single cluster member,
//! decides when its upstream has failed, and drives the Election Engine and
//! Failover Orchestrator in response. One task per monitored node, dispatched
//! by the node's configured role.

use crate::core::election::{self, ElectionOutcome};
use crate::core::errors::{RepguardError, Result};
use crate::core::failover::{self, FailoverCommands};
use crate::core::metadata::{EventTag, MetadataClient};
use crate::core::model::{FailoverState, NodeInfo, NodeStatus, NodeType};
use crate::logging::LogReloadHandle;
use crate::signals::ReloadFlag;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Per-node reconnection policy: how many times, and how far apart, to
/// retry a lost connection before declaring the peer down.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

/// SIGHUP support: the sticky flag set by the signal handler, the running
/// subscriber's reload handle, and the config file path to reread. `None`
/// when the caller never installed signal handling (e.g. in tests).
pub struct ReloadSupport {
    pub flag: ReloadFlag,
    pub log_handle: LogReloadHandle,
    pub config_file: String,
}

/// Everything one monitored node's task needs: its own identity, how to
/// reach the metadata store, and the operator-configured commands and
/// timeouts that govern its failover behavior.
pub struct Daemon<C: MetadataClient> {
    pub client: C,
    pub self_node: NodeInfo,
    pub commands: FailoverCommands,
    pub reconnect: ReconnectPolicy,
    pub log_status_interval: Duration,
    pub reload: Option<ReloadSupport>,
}

impl<C: MetadataClient> Daemon<C> {
    pub fn new(
        client: C,
        self_node: NodeInfo,
        commands: FailoverCommands,
        reconnect: ReconnectPolicy,
        log_status_interval: Duration,
    ) -> Self {
        Self {
            client,
            self_node,
            commands,
            reconnect,
            log_status_interval,
            reload: None,
        }
    }

    pub fn with_reload_support(mut self, reload: ReloadSupport) -> Self {
        self.reload = Some(reload);
        self
    }
}

/// If SIGHUP fired since the last check, rereads the config file's log
/// level and applies it to the running subscriber. The rest of the config
/// (commands, timeouts) is intentionally left alone until the next restart —
/// spec.md only asks for "reload config" at a convenient point, and changing
/// failover commands mid-episode would be unsafe.
async fn maybe_reload_config<C: MetadataClient>(daemon: &Daemon<C>) {
    let Some(support) = &daemon.reload else {
        return;
    };
    if !support.flag.take() {
        return;
    }
    info!(
        "node {} applying deferred SIGHUP reload",
        daemon.self_node.node_id
    );
    match crate::config::DaemonConfig::from_file(&support.config_file).await {
        Ok(config) => {
            if let Some(level) = config.log_level.as_deref() {
                crate::logging::reload(&support.log_handle, &format!("repguard={level}"));
            }
        }
        Err(e) => warn!("SIGHUP reload: failed to reread config file: {}", e),
    }
}

/// What a single role-monitoring loop decided when it returned.
enum LoopAction {
    /// Shutdown was requested; the whole daemon task should exit.
    Shutdown,
    /// This node's role changed (promoted, or now following a different
    /// upstream); the top-level dispatcher should re-read `self_node` and
    /// re-enter the matching loop.
    Continue,
}

/// Top-level driver: dispatches on this node's configured role, re-entering
/// whichever loop matches after a role change, until shutdown. A witness or
/// BDR node takes no part in election or failover; this is logged rather
/// than silently skipped.
pub async fn run<C: MetadataClient>(
    daemon: &mut Daemon<C>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    loop {
        let action = match daemon.self_node.node_type {
            NodeType::Primary => monitor_primary(daemon, &mut shutdown).await?,
            NodeType::Standby => monitor_standby(daemon, &mut shutdown).await?,
            NodeType::Witness | NodeType::Bdr => {
                warn!(
                    "node {} has type {:?}; repguard takes no monitoring action for this role",
                    daemon.self_node.node_id, daemon.self_node.node_type
                );
                return Ok(());
            }
            NodeType::Unknown => {
                return Err(RepguardError::Config(format!(
                    "node {} has no resolvable type",
                    daemon.self_node.node_id
                )));
            }
        };
        match action {
            LoopAction::Shutdown => return Ok(()),
            LoopAction::Continue => continue,
        }
    }
}

/// A primary has nothing to elect; it just watches its own local session and
/// logs periodic status, ready to notice a demotion (e.g. `pg_is_in_recovery`
/// flips to true underneath it, meaning some other tool intervened).
async fn monitor_primary<C: MetadataClient>(
    daemon: &mut Daemon<C>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<LoopAction> {
    let mut local_session = daemon.client.connect_peer(&daemon.self_node.conninfo).await?;
    daemon
        .client
        .create_event_record(
            Some(&mut local_session),
            daemon.self_node.node_id,
            EventTag::RepmgrdStart,
            true,
            "monitoring started (primary)",
        )
        .await;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(daemon.log_status_interval) => {}
            _ = shutdown.recv() => {
                daemon.client.close_peer(local_session).await;
                return Ok(LoopAction::Shutdown);
            }
        }
        maybe_reload_config(daemon).await;

        if let Err(e) = daemon.client.reset_voting_status(&mut local_session).await {
            warn!(
                "node {} failed to reset voting status at top of tick: {}",
                daemon.self_node.node_id, e
            );
        }

        match daemon.client.get_recovery_type(&mut local_session).await {
            Ok(NodeType::Standby) => {
                warn!(
                    "node {} was configured as primary but now reports being in recovery; \
                     re-dispatching as a standby",
                    daemon.self_node.node_id
                );
                daemon.client.close_peer(local_session).await;
                daemon.self_node.node_type = NodeType::Standby;
                return Ok(LoopAction::Continue);
            }
            Ok(_) => debug!("node {} primary status check ok", daemon.self_node.node_id),
            Err(e) => {
                warn!(
                    "lost local session on primary node {}: {}; reconnecting",
                    daemon.self_node.node_id, e
                );
                let (reconnected, status) = daemon
                    .client
                    .try_reconnect(
                        &daemon.self_node.conninfo,
                        daemon.reconnect.attempts,
                        daemon.reconnect.interval,
                    )
                    .await;
                match reconnected {
                    Some(session) => local_session = session,
                    None if status == NodeStatus::Down => {
                        return Err(RepguardError::LocalSessionLost);
                    }
                    None => {}
                }
            }
        }
    }
}

/// A standby watches its upstream. Once the upstream is judged down beyond
/// the configured reconnect budget, it runs an election and acts on the
/// result; afterward it keeps monitoring under its (possibly new) role.
async fn monitor_standby<C: MetadataClient>(
    daemon: &mut Daemon<C>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<LoopAction> {
    let mut local_session = daemon.client.connect_peer(&daemon.self_node.conninfo).await?;
    daemon
        .client
        .create_event_record(
            Some(&mut local_session),
            daemon.self_node.node_id,
            EventTag::RepmgrdStart,
            true,
            "monitoring started (standby)",
        )
        .await;

    let upstream = match fetch_upstream_record(daemon, &mut local_session).await {
        Ok(u) => u,
        Err(e) => {
            daemon.client.close_peer(local_session).await;
            return Err(e);
        }
    };

    loop {
        tokio::select! {
            _ = tokio::time::sleep(daemon.log_status_interval) => {}
            _ = shutdown.recv() => {
                daemon.client.close_peer(local_session).await;
                return Ok(LoopAction::Shutdown);
            }
        }
        maybe_reload_config(daemon).await;

        if let Err(e) = daemon.client.reset_voting_status(&mut local_session).await {
            warn!(
                "node {} failed to reset voting status at top of tick: {}",
                daemon.self_node.node_id, e
            );
        }

        if daemon.client.is_peer_available(&upstream.conninfo).await {
            debug!("node {} upstream reachable", daemon.self_node.node_id);
            continue;
        }

        warn!(
            "node {} cannot reach its upstream (node {}); attempting reconnect",
            daemon.self_node.node_id, upstream.node_id
        );
        daemon
            .client
            .create_event_record(
                Some(&mut local_session),
                daemon.self_node.node_id,
                EventTag::RepmgrdLocalDisconnect,
                true,
                "upstream unreachable, starting reconnect budget",
            )
            .await;

        let (reachable_session, status) = daemon
            .client
            .try_reconnect(
                &upstream.conninfo,
                daemon.reconnect.attempts,
                daemon.reconnect.interval,
            )
            .await;
        if let Some(probe) = reachable_session {
            daemon.client.close_peer(probe).await;
        }

        if status == NodeStatus::Up {
            daemon
                .client
                .create_event_record(
                    Some(&mut local_session),
                    daemon.self_node.node_id,
                    EventTag::RepmgrdLocalReconnect,
                    true,
                    "upstream reachable again, no election needed",
                )
                .await;
            continue;
        }

        let (final_state, new_session) =
            run_election_and_failover(daemon, local_session, &upstream).await?;
        local_session = new_session;
        info!(
            "node {} failover episode concluded with state {:?}",
            daemon.self_node.node_id, final_state
        );

        match final_state {
            FailoverState::Promoted => {
                daemon.client.close_peer(local_session).await;
                daemon.self_node.node_type = NodeType::Primary;
                return Ok(LoopAction::Continue);
            }
            FailoverState::FollowedNewPrimary => {
                // Our own record's upstream_node_id was updated by the
                // follow command against the new primary's metadata; refresh
                // it so the top-level dispatcher re-enters with the right
                // upstream the next time round.
                if let Ok(Some(refreshed)) = daemon
                    .client
                    .get_node_record(&mut local_session, daemon.self_node.node_id)
                    .await
                {
                    daemon.self_node.upstream_node_id = refreshed.upstream_node_id;
                }
                daemon.client.close_peer(local_session).await;
                return Ok(LoopAction::Continue);
            }
            FailoverState::LocalNodeFailure => {
                daemon.client.close_peer(local_session).await;
                return Err(RepguardError::LocalSessionLost);
            }
            _ => continue,
        }
    }
}

async fn fetch_upstream_record<C: MetadataClient>(
    daemon: &Daemon<C>,
    local_session: &mut C::Peer,
) -> Result<NodeInfo> {
    let Some(upstream_id) = daemon.self_node.upstream_node_id else {
        return Err(RepguardError::Config(format!(
            "standby node {} has no configured upstream_node_id",
            daemon.self_node.node_id
        )));
    };
    daemon
        .client
        .get_node_record(local_session, upstream_id)
        .await?
        .ok_or(RepguardError::OwnNodeMissing(upstream_id))
}

/// Runs one election round and dispatches its outcome through the Failover
/// Orchestrator. `failed_primary` is the cached record fetched just before
/// the reconnect budget expired — `promote_self`/`follow_new_primary` use its
/// identity to recognize the original primary coming back mid-episode.
async fn run_election_and_failover<C: MetadataClient>(
    daemon: &Daemon<C>,
    local_session: C::Peer,
    failed_primary: &NodeInfo,
) -> Result<(FailoverState, C::Peer)> {
    let mut local_session = local_session;
    let outcome: ElectionOutcome =
        election::do_election(&daemon.client, &mut local_session, &daemon.self_node).await?;

    failover::run_failover(
        &daemon.client,
        local_session,
        &daemon.self_node,
        failed_primary,
        &outcome,
        &daemon.commands,
    )
    .await
}
