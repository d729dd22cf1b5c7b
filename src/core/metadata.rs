// src/core/metadata.rs

//! The Metadata Client: reads and writes cluster metadata, and carries the
//! RPC-shaped operations (candidacy announcement, vote request, follow
//! notification) that are really just function calls against a peer's
//! database session. Generic over the session/"peer handle" type so the
//! Election Engine and Failover Orchestrator (which only ever talk to this
//! trait) can be exercised in tests against an in-memory fixture instead of
//! a live Postgres instance.

use crate::core::errors::Result;
use crate::core::model::{ElectoralTerm, NodeInfo, NodeStatus, NodeType, VotingStatus};
use crate::core::peer;
use async_trait::async_trait;
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

/// A significant daemon action, written to the metadata database for
/// operator audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EventTag {
    RepmgrdStart,
    RepmgrdLocalDisconnect,
    RepmgrdLocalReconnect,
    RepmgrdFailoverPromote,
    RepmgrdFailoverAbort,
    RepmgrdFailoverFollow,
}

/// Operations the rest of the daemon needs from the cluster's shared
/// metadata store. `Peer` is an opaque handle to one open session — in
/// production a [`peer::Session`] wrapping a `sqlx` Postgres connection, in
/// tests a lightweight in-memory stand-in.
#[async_trait]
pub trait MetadataClient: Send + Sync + 'static {
    type Peer: Send + 'static;

    /// Opens a session to `conninfo` (delegates to the Peer Connector).
    async fn connect_peer(&self, conninfo: &str) -> Result<Self::Peer>;
    /// Closes a previously opened session. Always safe to call.
    async fn close_peer(&self, peer: Self::Peer);
    /// Cheap reachability probe, no session left open.
    async fn is_peer_available(&self, conninfo: &str) -> bool;

    /// Probes reachability, then opens a session, retrying up to
    /// `max_attempts` times with `interval` between attempts. Bounded: the
    /// caller decides whether to declare failover once this returns `Down` —
    /// it never blocks indefinitely itself. The default implementation is
    /// built from [`is_peer_available`](Self::is_peer_available) and
    /// [`connect_peer`](Self::connect_peer), so implementors only need to
    /// override it if a cheaper combined probe-and-connect exists.
    async fn try_reconnect(
        &self,
        conninfo: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> (Option<Self::Peer>, NodeStatus) {
        for attempt in 1..=max_attempts.max(1) {
            if self.is_peer_available(conninfo).await {
                match self.connect_peer(conninfo).await {
                    Ok(session) => return (Some(session), NodeStatus::Up),
                    Err(e) => tracing::warn!(
                        "reachability probe for {} succeeded but connect failed on attempt {}/{}: {}",
                        conninfo,
                        attempt,
                        max_attempts,
                        e
                    ),
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }
        (None, NodeStatus::Down)
    }

    async fn get_node_record(&self, session: &mut Self::Peer, node_id: i64)
    -> Result<Option<NodeInfo>>;

    /// All `active = true` nodes whose `upstream_node_id = upstream_id`,
    /// excluding `self_id`.
    async fn get_active_sibling_node_records(
        &self,
        session: &mut Self::Peer,
        self_id: i64,
        upstream_id: i64,
    ) -> Result<Vec<NodeInfo>>;

    async fn get_voting_status(&self, session: &mut Self::Peer) -> Result<VotingStatus>;
    async fn set_voting_status_initiated(&self, session: &mut Self::Peer)
    -> Result<ElectoralTerm>;
    async fn reset_voting_status(&self, session: &mut Self::Peer) -> Result<()>;

    async fn get_last_wal_receive_location(&self, session: &mut Self::Peer) -> Result<u64>;

    async fn get_recovery_type(&self, session: &mut Self::Peer) -> Result<NodeType>;

    /// Finds and connects to whichever node currently reports itself
    /// `PRIMARY`, used to detect a resurrected old primary.
    async fn get_primary_connection(
        &self,
        session: &mut Self::Peer,
    ) -> Result<(Self::Peer, i64)>;

    /// `peer` returns `false` iff it is itself `VoteInitiated` with a term
    /// greater than or equal to ours.
    async fn announce_candidature(
        &self,
        peer: &mut Self::Peer,
        self_id: i64,
        term: ElectoralTerm,
    ) -> Result<bool>;

    /// Returns `(vote_count, peer_last_wal_receive_lsn)` — `vote_count` is 1
    /// if the peer grants us its vote, 0 otherwise; the peer's LSN rides
    /// along on the same round-trip so the candidate learns if it is behind.
    async fn request_vote(
        &self,
        peer: &mut Self::Peer,
        self_id: i64,
        term: ElectoralTerm,
    ) -> Result<(u32, u64)>;

    /// Writes the follow directive into the peer's metadata.
    async fn notify_follow_primary(
        &self,
        peer: &mut Self::Peer,
        new_primary_id: i64,
    ) -> Result<()>;

    /// Polls the local directive set by some candidate's
    /// `notify_follow_primary`.
    async fn get_new_primary(&self, session: &mut Self::Peer) -> Result<Option<i64>>;

    /// Best-effort audit trail; tolerates a missing session by logging
    /// locally instead of failing the caller.
    async fn create_event_record(
        &self,
        session: Option<&mut Self::Peer>,
        node_id: i64,
        event: EventTag,
        success: bool,
        detail: &str,
    );
}

/// Production implementation, backed by a shared Postgres metadata schema.
/// This crate does not own that schema's DDL or the `repguard.*` functions
/// it calls — they are an external collaborator this crate does not own.
/// way `repmgr`'s own C core treats its SQL helper functions.
#[derive(Debug, Clone, Default)]
pub struct PgMetadataClient;

impl PgMetadataClient {
    pub fn new() -> Self {
        Self
    }
}

/// Parses the `repguard.nodes.type` column, falling back to `Unknown` for a
/// value this crate doesn't recognize rather than failing the whole query.
fn node_type_from_str(s: &str) -> NodeType {
    NodeType::from_str(s).unwrap_or(NodeType::Unknown)
}

#[async_trait]
impl MetadataClient for PgMetadataClient {
    type Peer = peer::Session;

    async fn connect_peer(&self, conninfo: &str) -> Result<Self::Peer> {
        peer::connect(conninfo, false).await
    }

    async fn close_peer(&self, peer: Self::Peer) {
        peer.close().await;
    }

    async fn is_peer_available(&self, conninfo: &str) -> bool {
        peer::is_available(conninfo).await
    }

    async fn get_node_record(
        &self,
        session: &mut Self::Peer,
        node_id: i64,
    ) -> Result<Option<NodeInfo>> {
        let row = sqlx::query(
            "SELECT node_id, node_name, conninfo, type, upstream_node_id, priority, active \
             FROM repguard.nodes WHERE node_id = $1",
        )
        .bind(node_id)
        .fetch_optional(session.connection_mut())
        .await?;

        Ok(row.map(|r| {
            NodeInfo::new(
                r.get("node_id"),
                r.get("node_name"),
                r.get("conninfo"),
                node_type_from_str(r.get::<String, _>("type").as_str()),
                r.get::<Option<i64>, _>("upstream_node_id"),
                r.get("priority"),
                r.get("active"),
            )
        }))
    }

    async fn get_active_sibling_node_records(
        &self,
        session: &mut Self::Peer,
        self_id: i64,
        upstream_id: i64,
    ) -> Result<Vec<NodeInfo>> {
        let rows = sqlx::query(
            "SELECT node_id, node_name, conninfo, type, upstream_node_id, priority, active \
             FROM repguard.nodes \
             WHERE active = true AND upstream_node_id = $1 AND node_id <> $2 \
             ORDER BY node_id",
        )
        .bind(upstream_id)
        .bind(self_id)
        .fetch_all(session.connection_mut())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                NodeInfo::new(
                    r.get("node_id"),
                    r.get("node_name"),
                    r.get("conninfo"),
                    node_type_from_str(r.get::<String, _>("type").as_str()),
                    r.get::<Option<i64>, _>("upstream_node_id"),
                    r.get("priority"),
                    r.get("active"),
                )
            })
            .collect())
    }

    async fn get_voting_status(&self, session: &mut Self::Peer) -> Result<VotingStatus> {
        let row = sqlx::query("SELECT repguard.get_voting_status() AS status")
            .fetch_one(session.connection_mut())
            .await?;
        let status: String = row.get("status");
        Ok(match status.as_str() {
            "NO_VOTE" => VotingStatus::NoVote,
            "VOTE_REQUEST_RECEIVED" => VotingStatus::VoteRequestReceived,
            "VOTE_INITIATED" => VotingStatus::VoteInitiated,
            _ => VotingStatus::Unknown,
        })
    }

    async fn set_voting_status_initiated(
        &self,
        session: &mut Self::Peer,
    ) -> Result<ElectoralTerm> {
        let row = sqlx::query("SELECT repguard.set_voting_status_initiated() AS term")
            .fetch_one(session.connection_mut())
            .await?;
        Ok(ElectoralTerm(row.get("term")))
    }

    async fn reset_voting_status(&self, session: &mut Self::Peer) -> Result<()> {
        sqlx::query("SELECT repguard.reset_voting_status()")
            .execute(session.connection_mut())
            .await?;
        Ok(())
    }

    async fn get_last_wal_receive_location(&self, session: &mut Self::Peer) -> Result<u64> {
        let row = sqlx::query("SELECT repguard.get_last_wal_receive_location() AS lsn")
            .fetch_one(session.connection_mut())
            .await?;
        let lsn: i64 = row.get("lsn");
        Ok(lsn as u64)
    }

    async fn get_recovery_type(&self, session: &mut Self::Peer) -> Result<NodeType> {
        let row = sqlx::query("SELECT pg_is_in_recovery() AS in_recovery")
            .fetch_one(session.connection_mut())
            .await?;
        let in_recovery: bool = row.get("in_recovery");
        Ok(if in_recovery {
            NodeType::Standby
        } else {
            NodeType::Primary
        })
    }

    async fn get_primary_connection(
        &self,
        session: &mut Self::Peer,
    ) -> Result<(Self::Peer, i64)> {
        let row = sqlx::query(
            "SELECT node_id, conninfo FROM repguard.nodes WHERE type = 'primary' LIMIT 1",
        )
        .fetch_one(session.connection_mut())
        .await?;
        let primary_id: i64 = row.get("node_id");
        let conninfo: String = row.get("conninfo");
        let primary_session = peer::connect(&conninfo, false).await?;
        Ok((primary_session, primary_id))
    }

    async fn announce_candidature(
        &self,
        peer: &mut Self::Peer,
        self_id: i64,
        term: ElectoralTerm,
    ) -> Result<bool> {
        let row = sqlx::query("SELECT repguard.announce_candidature($1, $2) AS accepted")
            .bind(self_id)
            .bind(term.0)
            .fetch_one(peer.connection_mut())
            .await?;
        Ok(row.get("accepted"))
    }

    async fn request_vote(
        &self,
        peer: &mut Self::Peer,
        self_id: i64,
        term: ElectoralTerm,
    ) -> Result<(u32, u64)> {
        let row = sqlx::query(
            "SELECT vote, last_wal_receive_lsn FROM repguard.request_vote($1, $2)",
        )
        .bind(self_id)
        .bind(term.0)
        .fetch_one(peer.connection_mut())
        .await?;
        let vote: i32 = row.get("vote");
        let lsn: i64 = row.get("last_wal_receive_lsn");
        Ok((vote.max(0) as u32, lsn as u64))
    }

    async fn notify_follow_primary(
        &self,
        peer: &mut Self::Peer,
        new_primary_id: i64,
    ) -> Result<()> {
        sqlx::query("SELECT repguard.notify_follow_primary($1)")
            .bind(new_primary_id)
            .execute(peer.connection_mut())
            .await?;
        Ok(())
    }

    async fn get_new_primary(&self, session: &mut Self::Peer) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT new_primary_id FROM repguard.get_new_primary()")
            .fetch_one(session.connection_mut())
            .await?;
        Ok(row.get::<Option<i64>, _>("new_primary_id"))
    }

    async fn create_event_record(
        &self,
        session: Option<&mut Self::Peer>,
        node_id: i64,
        event: EventTag,
        success: bool,
        detail: &str,
    ) {
        let Some(session) = session else {
            tracing::info!(node_id, %event, success, detail, "event record (no session, logged locally)");
            return;
        };
        let result = sqlx::query(
            "INSERT INTO repguard.events (node_id, event_type, success, details) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(node_id)
        .bind(event.to_string())
        .bind(success)
        .bind(detail)
        .execute(session.connection_mut())
        .await;
        if let Err(e) = result {
            tracing::warn!(node_id, %event, "failed to persist event record: {}", e);
        }
    }
}
