// src/core/failover.rs

//! The Failover Orchestrator: turns an election verdict into concrete
//! action — promoting the local node, following whichever sibling won
//! instead, or recognizing that the old primary came back. Implements
//! including the `Lost` branch's tie-break consultation and
//! `promote_self`/`follow_new_primary`'s full reappearance checks.

use crate::core::election::{self, ElectionOutcome};
use crate::core::errors::{RepguardError, Result};
use crate::core::metadata::{EventTag, MetadataClient};
use crate::core::model::{ElectionResult, FailoverState, NodeInfo, NodeType};
use crate::core::shell;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

/// The subset of a node's configuration the orchestrator needs to act.
/// Owned by the caller (the Monitor Loop), built from `config.rs`.
#[derive(Debug, Clone)]
pub struct FailoverCommands {
    pub promote_command: Option<String>,
    pub service_promote_command: Option<String>,
    pub follow_command: Option<String>,
    pub promote_delay: Duration,
    pub primary_notification_timeout: Duration,
    pub primary_notification_poll_interval: Duration,
}

/// Runs whichever external command is configured to promote this node to
/// primary, then resolves the outcome:
///
/// 1. optional `promote_delay` sleep (a testing aid — it gives a reappearing
///    primary a window to come back before the command commits);
/// 2. invoke the command;
/// 3. a non-zero exit consults [`MetadataClient::get_primary_connection`]: if
///    a live primary now exists and its id matches `failed_primary`, the
///    original came back during the attempt (`PrimaryReappeared`), otherwise
///    the promotion is simply considered failed (`PromotionFailed`);
/// 4. on success, verify the local session is still reachable, reconnecting
///    once (a second failure is `LocalNodeFailure`).
pub async fn promote_self<C: MetadataClient>(
    client: &C,
    local_session: &mut C::Peer,
    self_node: &NodeInfo,
    failed_primary: &NodeInfo,
    commands: &FailoverCommands,
) -> Result<FailoverState> {
    if !commands.promote_delay.is_zero() {
        info!(
            "node {} sleeping {:?} before running the promote command",
            self_node.node_id, commands.promote_delay
        );
        sleep(commands.promote_delay).await;
    }

    let command_line = commands
        .promote_command
        .as_deref()
        .or(commands.service_promote_command.as_deref())
        .ok_or(RepguardError::MissingPromoteCommand)?;

    let code = shell::run_command(command_line).await?;

    if code != Some(0) {
        warn!(
            "promote command for node {} exited non-zero ({:?}); checking whether the old primary reappeared",
            self_node.node_id, code
        );
        return Ok(match client.get_primary_connection(local_session).await {
            Ok((session, primary_id)) => {
                client.close_peer(session).await;
                if primary_id == failed_primary.node_id {
                    FailoverState::PrimaryReappeared
                } else {
                    FailoverState::PromotionFailed
                }
            }
            Err(_) => FailoverState::PromotionFailed,
        });
    }

    if !client.is_peer_available(&self_node.conninfo).await {
        warn!(
            "promote command succeeded but node {}'s local session is unreachable; reconnecting once",
            self_node.node_id
        );
        match client.connect_peer(&self_node.conninfo).await {
            Ok(fresh) => {
                let stale = std::mem::replace(local_session, fresh);
                client.close_peer(stale).await;
            }
            Err(_) => return Ok(FailoverState::LocalNodeFailure),
        }
    }

    info!("node {} promote command succeeded", self_node.node_id);
    Ok(FailoverState::Promoted)
}

/// Runs the configured `follow_command` against the newly elected primary,
/// Takes ownership of the local
/// session because the follow command is expected to restart the local
/// server process, invalidating whatever session was open — the returned
/// session (on every path) is always a fresh one the caller can keep using.
pub async fn follow_new_primary<C: MetadataClient>(
    client: &C,
    local_session: C::Peer,
    self_node: &NodeInfo,
    new_primary: &NodeInfo,
    failed_primary: &NodeInfo,
    commands: &FailoverCommands,
) -> Result<(FailoverState, C::Peer)> {
    client.close_peer(local_session).await;

    let mut new_primary_session = client.connect_peer(&new_primary.conninfo).await?;
    let recovery_type = client.get_recovery_type(&mut new_primary_session).await;
    client.close_peer(new_primary_session).await;

    if !matches!(recovery_type, Ok(NodeType::Primary)) {
        warn!(
            "node {} expected node {} to report itself as primary before following it; it did not",
            self_node.node_id, new_primary.node_id
        );
        let reconnected = client.connect_peer(&self_node.conninfo).await?;
        return Ok((FailoverState::FollowFail, reconnected));
    }

    let template = commands
        .follow_command
        .as_deref()
        .ok_or(RepguardError::MissingFollowCommand)?;
    let mut vars = HashMap::new();
    vars.insert('p', new_primary.conninfo.clone());
    vars.insert('n', new_primary.node_id.to_string());
    let command_line = shell::expand_placeholders(template, &vars);
    let code = shell::run_command(&command_line).await?;

    if code != Some(0) {
        warn!(
            "follow command for node {} exited non-zero ({:?}); checking whether the old primary node {} is back",
            self_node.node_id, code, failed_primary.node_id
        );
        let state = match client.connect_peer(&failed_primary.conninfo).await {
            Ok(mut old_session) => {
                let recovery = client.get_recovery_type(&mut old_session).await;
                client.close_peer(old_session).await;
                if matches!(recovery, Ok(NodeType::Primary)) {
                    FailoverState::PrimaryReappeared
                } else {
                    FailoverState::FollowFail
                }
            }
            Err(_) => FailoverState::FollowFail,
        };
        let reconnected = client.connect_peer(&self_node.conninfo).await?;
        return Ok((state, reconnected));
    }

    // Refresh our own and the new upstream's records from the new primary's
    // database — the promote/follow commands are expected to have updated
    // metadata there.
    let mut new_primary_session = client.connect_peer(&new_primary.conninfo).await?;
    let _ = client
        .get_node_record(&mut new_primary_session, self_node.node_id)
        .await?;
    let _ = client
        .get_node_record(&mut new_primary_session, new_primary.node_id)
        .await?;
    client.close_peer(new_primary_session).await;

    info!(
        "node {} now following new primary node {}",
        self_node.node_id, new_primary.node_id
    );
    let reopened = client.connect_peer(&self_node.conninfo).await?;
    Ok((FailoverState::FollowedNewPrimary, reopened))
}

/// Polls the local session's follow directive until some candidate writes
/// one via [`MetadataClient::notify_follow_primary`], or `timeout` elapses.
pub async fn wait_primary_notification<C: MetadataClient>(
    client: &C,
    local_session: &mut C::Peer,
    commands: &FailoverCommands,
) -> Option<i64> {
    let deadline = Instant::now() + commands.primary_notification_timeout;
    loop {
        match client.get_new_primary(local_session).await {
            Ok(Some(new_primary_id)) => return Some(new_primary_id),
            Ok(None) => {}
            Err(e) => warn!("error polling for new primary notification: {}", e),
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(commands.primary_notification_poll_interval).await;
    }
}

/// Tells every sibling in `siblings` to follow `new_primary_id`, reconnecting
/// to each in turn. Best-effort: a sibling that cannot be reached is logged
/// and skipped, never aborts the whole round (invariant: promotion must not
/// be undone by a follower's notification failure).
pub async fn notify_followers<C: MetadataClient>(
    client: &C,
    self_id: i64,
    siblings: &[NodeInfo],
    new_primary_id: i64,
) {
    for sibling in siblings {
        if sibling.node_id == new_primary_id {
            continue;
        }
        let mut peer_session = match client.connect_peer(&sibling.conninfo).await {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    "could not reach sibling {} to notify it to follow node {}: {}",
                    sibling.node_id, new_primary_id, e
                );
                continue;
            }
        };
        if let Err(e) = client
            .notify_follow_primary(&mut peer_session, new_primary_id)
            .await
        {
            warn!(
                "failed to notify sibling {} to follow node {}: {}",
                sibling.node_id, new_primary_id, e
            );
        }
        client.close_peer(peer_session).await;
        client
            .create_event_record(
                None,
                self_id,
                EventTag::RepmgrdFailoverFollow,
                true,
                &format!("notified node {} to follow node {}", sibling.node_id, new_primary_id),
            )
            .await;
    }
}

/// Picks the `follow_node_id` to broadcast for a just-reached terminal
/// state, per spec.md §4.D: after `Promoted` siblings follow this node,
/// after `PrimaryReappeared` they resume following the original primary.
/// Every other terminal state leaves the fleet's topology untouched, so no
/// broadcast happens.
async fn notify_followers_on_terminal_state<C: MetadataClient>(
    client: &C,
    self_node: &NodeInfo,
    failed_primary: &NodeInfo,
    siblings: &[NodeInfo],
    state: FailoverState,
) {
    let follow_node_id = match state {
        FailoverState::Promoted => self_node.node_id,
        FailoverState::PrimaryReappeared => failed_primary.node_id,
        _ => return,
    };
    notify_followers(client, self_node.node_id, siblings, follow_node_id).await;
}

/// Carries out the action implied by an election outcome, returning the
/// terminal [`FailoverState`] for this episode plus a usable local session
/// (every path, including follow/promote restarts, hands back a fresh one).
/// `failed_primary` is the cached record of the upstream that triggered this
/// episode, used both to tag audit events and to recognize its return.
pub async fn run_failover<C: MetadataClient>(
    client: &C,
    local_session: C::Peer,
    self_node: &NodeInfo,
    failed_primary: &NodeInfo,
    outcome: &ElectionOutcome,
    commands: &FailoverCommands,
) -> Result<(FailoverState, C::Peer)> {
    match outcome.result {
        ElectionResult::NotCandidate => {
            handle_waiting_new_primary(client, local_session, self_node, failed_primary, commands)
                .await
        }

        ElectionResult::Won => {
            let mut local_session = local_session;
            let state = promote_and_record(client, &mut local_session, self_node, failed_primary, commands)
                .await?;
            notify_followers_on_terminal_state(
                client,
                self_node,
                failed_primary,
                &outcome.siblings.0,
                state,
            )
            .await;
            Ok((state, local_session))
        }

        ElectionResult::Lost => {
            let best = election::poll_best_candidate(self_node, &outcome.siblings.0);
            if best.node_id == self_node.node_id {
                info!(
                    "node {} lost the unanimity vote but is still the best candidate by tie-break; promoting",
                    self_node.node_id
                );
                let mut local_session = local_session;
                let state =
                    promote_and_record(client, &mut local_session, self_node, failed_primary, commands)
                        .await?;
                notify_followers_on_terminal_state(
                    client,
                    self_node,
                    failed_primary,
                    &outcome.siblings.0,
                    state,
                )
                .await;
                return Ok((state, local_session));
            }

            info!(
                "node {} lost the election; best candidate is node {}, notifying it and waiting",
                self_node.node_id, best.node_id
            );
            let best_id = best.node_id;
            let best_conninfo = best.conninfo.clone();
            let notified = match client.connect_peer(&best_conninfo).await {
                Ok(mut peer_session) => {
                    let result = client.notify_follow_primary(&mut peer_session, best_id).await;
                    client.close_peer(peer_session).await;
                    result.is_ok()
                }
                Err(e) => {
                    warn!("could not reach best candidate node {}: {}", best_id, e);
                    false
                }
            };
            if !notified {
                return Ok((FailoverState::NodeNotificationError, local_session));
            }

            handle_waiting_new_primary(client, local_session, self_node, failed_primary, commands)
                .await
        }
    }
}

async fn promote_and_record<C: MetadataClient>(
    client: &C,
    local_session: &mut C::Peer,
    self_node: &NodeInfo,
    failed_primary: &NodeInfo,
    commands: &FailoverCommands,
) -> Result<FailoverState> {
    match promote_self(client, local_session, self_node, failed_primary, commands).await {
        Ok(state @ FailoverState::Promoted) => {
            client
                .create_event_record(
                    Some(local_session),
                    self_node.node_id,
                    EventTag::RepmgrdFailoverPromote,
                    true,
                    "promoted to primary",
                )
                .await;
            Ok(state)
        }
        Ok(state) => {
            warn!("node {} promotion did not complete: {:?}", self_node.node_id, state);
            client
                .create_event_record(
                    Some(local_session),
                    self_node.node_id,
                    EventTag::RepmgrdFailoverAbort,
                    false,
                    &format!("{:?}", state),
                )
                .await;
            Ok(state)
        }
        Err(e) => {
            warn!("promotion failed for node {}: {}", self_node.node_id, e);
            client
                .create_event_record(
                    Some(local_session),
                    self_node.node_id,
                    EventTag::RepmgrdFailoverAbort,
                    false,
                    &e.to_string(),
                )
                .await;
            Err(e)
        }
    }
}

/// Implements the "WAITING_NEW_PRIMARY resolves" dispatch shared by the
/// `Lost` (after notifying the tie-break winner) and `NotCandidate` branches
/// of the action table below.
async fn handle_waiting_new_primary<C: MetadataClient>(
    client: &C,
    local_session: C::Peer,
    self_node: &NodeInfo,
    failed_primary: &NodeInfo,
    commands: &FailoverCommands,
) -> Result<(FailoverState, C::Peer)> {
    let mut local_session = local_session;
    match wait_primary_notification(client, &mut local_session, commands).await {
        Some(new_primary_id) if new_primary_id == failed_primary.node_id => {
            info!(
                "node {} told to follow the original primary node {}; nothing to do",
                self_node.node_id, new_primary_id
            );
            Ok((FailoverState::FollowingOriginalPrimary, local_session))
        }
        Some(new_primary_id) if new_primary_id == self_node.node_id => {
            info!(
                "node {} is the delegated promoter; the winner declined",
                self_node.node_id
            );
            let siblings = client
                .get_active_sibling_node_records(
                    &mut local_session,
                    self_node.node_id,
                    failed_primary.node_id,
                )
                .await
                .unwrap_or_else(|e| {
                    warn!(
                        "could not enumerate siblings before delegated promotion, notification will be skipped: {}",
                        e
                    );
                    Vec::new()
                });
            let state =
                promote_and_record(client, &mut local_session, self_node, failed_primary, commands)
                    .await?;
            notify_followers_on_terminal_state(client, self_node, failed_primary, &siblings, state)
                .await;
            Ok((state, local_session))
        }
        Some(new_primary_id) => {
            match client
                .get_node_record(&mut local_session, new_primary_id)
                .await?
            {
                Some(new_primary) => {
                    follow_new_primary(
                        client,
                        local_session,
                        self_node,
                        &new_primary,
                        failed_primary,
                        commands,
                    )
                    .await
                }
                None => {
                    warn!(
                        "notified to follow node {} but its record is gone",
                        new_primary_id
                    );
                    Ok((FailoverState::NodeNotificationError, local_session))
                }
            }
        }
        None => {
            warn!(
                "node {} timed out waiting for a follow notification",
                self_node.node_id
            );
            Ok((FailoverState::NoNewPrimary, local_session))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::MockMetadataClient;
    use crate::core::model::NodeType;

    fn commands(promote_ok: bool, follow_ok: bool) -> FailoverCommands {
        FailoverCommands {
            promote_command: Some(if promote_ok { "true".to_string() } else { "false".to_string() }),
            service_promote_command: None,
            follow_command: Some(if follow_ok {
                "true".to_string()
            } else {
                "false".to_string()
            }),
            promote_delay: Duration::ZERO,
            primary_notification_timeout: Duration::from_millis(200),
            primary_notification_poll_interval: Duration::from_millis(20),
        }
    }

    fn node(id: i64, node_type: NodeType, upstream: Option<i64>) -> NodeInfo {
        NodeInfo::new(id, format!("node{id}"), format!("conninfo{id}"), node_type, upstream, 100, true)
    }

    #[tokio::test]
    async fn promote_self_succeeds_when_command_exits_zero() {
        let self_node = node(2, NodeType::Standby, Some(1));
        let failed_primary = node(1, NodeType::Primary, None);
        let client = MockMetadataClient::new(vec![self_node.clone(), failed_primary.clone()]);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let state = promote_self(&client, &mut session, &self_node, &failed_primary, &commands(true, true))
            .await
            .unwrap();
        assert_eq!(state, FailoverState::Promoted);
    }

    #[tokio::test]
    async fn promote_self_reports_promotion_failed_when_no_primary_reappeared() {
        let self_node = node(2, NodeType::Standby, Some(1));
        let failed_primary = node(1, NodeType::Standby, None); // no node reports primary
        let client = MockMetadataClient::new(vec![self_node.clone(), failed_primary.clone()]);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let state = promote_self(&client, &mut session, &self_node, &failed_primary, &commands(false, true))
            .await
            .unwrap();
        assert_eq!(state, FailoverState::PromotionFailed);
    }

    #[tokio::test]
    async fn promote_self_detects_primary_reappeared_on_command_failure() {
        let self_node = node(2, NodeType::Standby, Some(1));
        // The failed primary still exists in the metadata and now reports itself PRIMARY again.
        let failed_primary = node(1, NodeType::Primary, None);
        let client = MockMetadataClient::new(vec![self_node.clone(), failed_primary.clone()]);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let state = promote_self(&client, &mut session, &self_node, &failed_primary, &commands(false, true))
            .await
            .unwrap();
        assert_eq!(state, FailoverState::PrimaryReappeared);
    }

    #[tokio::test]
    async fn missing_promote_command_is_a_config_error() {
        let self_node = node(2, NodeType::Standby, Some(1));
        let failed_primary = node(1, NodeType::Primary, None);
        let client = MockMetadataClient::new(vec![self_node.clone(), failed_primary.clone()]);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let bad_commands = FailoverCommands {
            promote_command: None,
            service_promote_command: None,
            follow_command: None,
            promote_delay: Duration::ZERO,
            primary_notification_timeout: Duration::from_millis(10),
            primary_notification_poll_interval: Duration::from_millis(5),
        };
        assert!(matches!(
            promote_self(&client, &mut session, &self_node, &failed_primary, &bad_commands).await,
            Err(RepguardError::MissingPromoteCommand)
        ));
    }

    #[tokio::test]
    async fn won_election_promotes_and_notifies_followers() {
        let self_node = node(2, NodeType::Standby, Some(1));
        let failed_primary = node(1, NodeType::Primary, None);
        let follower = node(3, NodeType::Standby, Some(1));
        let client =
            MockMetadataClient::new(vec![self_node.clone(), follower.clone(), failed_primary.clone()]);
        let session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = ElectionOutcome {
            result: ElectionResult::Won,
            term: Some(crate::core::model::ElectoralTerm(1)),
            siblings: crate::core::model::NodeInfoList::new(vec![follower]),
        };
        let (state, session) = run_failover(
            &client,
            session,
            &self_node,
            &failed_primary,
            &outcome,
            &commands(true, true),
        )
        .await
        .unwrap();
        assert_eq!(state, FailoverState::Promoted);
        client.close_peer(session).await;
        let mut follower_session = client.connect_peer("conninfo3").await.unwrap();
        assert_eq!(client.get_new_primary(&mut follower_session).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn primary_reappeared_notifies_followers_to_resume_the_original_primary() {
        let self_node = node(2, NodeType::Standby, Some(1));
        // The "failed" primary is still present and now reports itself PRIMARY
        // again, so promote_self will detect PrimaryReappeared instead of Promoted.
        let failed_primary = node(1, NodeType::Primary, None);
        let follower = node(3, NodeType::Standby, Some(1));
        let client =
            MockMetadataClient::new(vec![self_node.clone(), follower.clone(), failed_primary.clone()]);
        let session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = ElectionOutcome {
            result: ElectionResult::Won,
            term: Some(crate::core::model::ElectoralTerm(1)),
            siblings: crate::core::model::NodeInfoList::new(vec![follower]),
        };
        let (state, session) = run_failover(
            &client,
            session,
            &self_node,
            &failed_primary,
            &outcome,
            &commands(false, true),
        )
        .await
        .unwrap();
        assert_eq!(state, FailoverState::PrimaryReappeared);
        client.close_peer(session).await;
        let mut follower_session = client.connect_peer("conninfo3").await.unwrap();
        assert_eq!(client.get_new_primary(&mut follower_session).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn lost_election_follows_the_tie_break_winner_once_notified() {
        let self_node = node(2, NodeType::Standby, Some(1));
        let mut winner = node(3, NodeType::Standby, Some(1));
        winner.priority = 200; // strictly preferred over self_node in the tie-break
        let failed_primary = node(1, NodeType::Primary, None);
        let client =
            MockMetadataClient::new(vec![self_node.clone(), winner.clone(), failed_primary.clone()]);
        let self_session = client.connect_peer("conninfo2").await.unwrap();

        // Simulate the winner having already notified us to follow it.
        let mut tmp = client.connect_peer("conninfo2").await.unwrap();
        client.notify_follow_primary(&mut tmp, 3).await.unwrap();
        client.close_peer(tmp).await;

        let outcome = ElectionOutcome {
            result: ElectionResult::Lost,
            term: Some(crate::core::model::ElectoralTerm(1)),
            siblings: crate::core::model::NodeInfoList::new(vec![winner]),
        };
        let (state, session) = run_failover(
            &client,
            self_session,
            &self_node,
            &failed_primary,
            &outcome,
            &commands(true, true),
        )
        .await
        .unwrap();
        assert_eq!(state, FailoverState::FollowedNewPrimary);
        client.close_peer(session).await;
    }

    #[tokio::test]
    async fn lost_election_promotes_self_when_tie_break_prefers_self() {
        let mut self_node = node(2, NodeType::Standby, Some(1));
        self_node.priority = 200;
        let other = node(3, NodeType::Standby, Some(1));
        let failed_primary = node(1, NodeType::Primary, None);
        let client =
            MockMetadataClient::new(vec![self_node.clone(), other.clone(), failed_primary.clone()]);
        let session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = ElectionOutcome {
            result: ElectionResult::Lost,
            term: Some(crate::core::model::ElectoralTerm(1)),
            siblings: crate::core::model::NodeInfoList::new(vec![other]),
        };
        let (state, session) = run_failover(
            &client,
            session,
            &self_node,
            &failed_primary,
            &outcome,
            &commands(true, true),
        )
        .await
        .unwrap();
        assert_eq!(state, FailoverState::Promoted);
        client.close_peer(session).await;
    }

    #[tokio::test]
    async fn lost_election_times_out_with_no_notification() {
        let self_node = node(2, NodeType::Standby, Some(1));
        let failed_primary = node(1, NodeType::Primary, None);
        let client = MockMetadataClient::new(vec![self_node.clone(), failed_primary.clone()]);
        let session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = ElectionOutcome {
            result: ElectionResult::Lost,
            term: Some(crate::core::model::ElectoralTerm(1)),
            siblings: crate::core::model::NodeInfoList::default(),
        };
        let (state, session) = run_failover(
            &client,
            session,
            &self_node,
            &failed_primary,
            &outcome,
            &commands(true, true),
        )
        .await
        .unwrap();
        assert_eq!(state, FailoverState::Promoted);
        client.close_peer(session).await;
    }

    #[tokio::test]
    async fn follow_command_failure_with_reappeared_primary_is_reported() {
        let self_node = node(2, NodeType::Standby, Some(1));
        let new_primary = node(3, NodeType::Primary, None);
        let failed_primary = node(1, NodeType::Primary, None);
        let client =
            MockMetadataClient::new(vec![self_node.clone(), new_primary.clone(), failed_primary.clone()]);
        let session = client.connect_peer("conninfo2").await.unwrap();
        let (state, session) = follow_new_primary(
            &client,
            session,
            &self_node,
            &new_primary,
            &failed_primary,
            &commands(true, false),
        )
        .await
        .unwrap();
        assert_eq!(state, FailoverState::PrimaryReappeared);
        client.close_peer(session).await;
    }

    #[tokio::test]
    async fn follow_command_failure_without_reappeared_primary_is_follow_fail() {
        let self_node = node(2, NodeType::Standby, Some(1));
        let new_primary = node(3, NodeType::Primary, None);
        let failed_primary = node(1, NodeType::Standby, None); // gone, not reporting primary
        let client =
            MockMetadataClient::new(vec![self_node.clone(), new_primary.clone(), failed_primary.clone()]);
        let session = client.connect_peer("conninfo2").await.unwrap();
        let (state, session) = follow_new_primary(
            &client,
            session,
            &self_node,
            &new_primary,
            &failed_primary,
            &commands(true, false),
        )
        .await
        .unwrap();
        assert_eq!(state, FailoverState::FollowFail);
        client.close_peer(session).await;
    }
}
