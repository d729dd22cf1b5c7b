// src/core/model.rs

//! Data structures shared by the peer connector, metadata client, election
//! engine and failover orchestrator: the cluster's view of its own members.

use crate::core::peer::Session;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a cluster member plays.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum NodeType {
    Primary,
    Standby,
    Witness,
    Bdr,
    Unknown,
}

/// A cluster member, as recorded in the shared metadata database, plus the
/// transient fields populated during an election or notification round.
#[derive(Debug)]
pub struct NodeInfo {
    pub node_id: i64,
    pub node_name: String,
    pub conninfo: String,
    pub node_type: NodeType,
    pub upstream_node_id: Option<i64>,
    pub priority: i32,
    pub active: bool,

    /// Replication progress marker, numerically comparable. Only meaningful
    /// within a single `ElectoralTerm`.
    pub last_wal_receive_lsn: u64,
    /// Whether this election reached the peer successfully.
    pub is_visible: bool,
    /// Session handle owned by this record for the duration of one election
    /// or notification round. `None` outside of such a round.
    pub conn: Option<Session>,
}

impl NodeInfo {
    /// Builds a bare record, as read back from the metadata database, with no
    /// transient election state populated yet.
    pub fn new(
        node_id: i64,
        node_name: String,
        conninfo: String,
        node_type: NodeType,
        upstream_node_id: Option<i64>,
        priority: i32,
        active: bool,
    ) -> Self {
        Self {
            node_id,
            node_name,
            conninfo,
            node_type,
            upstream_node_id,
            priority,
            active,
            last_wal_receive_lsn: 0,
            is_visible: false,
            conn: None,
        }
    }

    /// Closes and drops this node's session, if one is held. Idempotent.
    pub async fn close_session(&mut self) {
        if let Some(session) = self.conn.take() {
            session.close().await;
        }
    }
}

/// Cloning a `NodeInfo` never duplicates its live session — the clone
/// always starts with `conn: None`, the same way a record freshly read back
/// from the metadata database would.
impl Clone for NodeInfo {
    fn clone(&self) -> Self {
        Self {
            node_id: self.node_id,
            node_name: self.node_name.clone(),
            conninfo: self.conninfo.clone(),
            node_type: self.node_type,
            upstream_node_id: self.upstream_node_id,
            priority: self.priority,
            active: self.active,
            last_wal_receive_lsn: self.last_wal_receive_lsn,
            is_visible: self.is_visible,
            conn: None,
        }
    }
}

/// An ordered sequence of sibling `NodeInfo` records, freshly gathered at the
/// start of every election or notification round. Dropping (or clearing) a
/// `NodeInfoList` must never leave a peer session open — the owning round is
/// responsible for calling [`NodeInfoList::close_all`] on every exit path
/// `Drop` only logs if that was missed.
#[derive(Debug, Default)]
pub struct NodeInfoList(pub Vec<NodeInfo>);

impl NodeInfoList {
    pub fn new(nodes: Vec<NodeInfo>) -> Self {
        Self(nodes)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeInfo> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, NodeInfo> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Closes every still-open peer session and empties the list.
    pub async fn close_all(&mut self) {
        for node in self.0.iter_mut() {
            node.close_session().await;
        }
        self.0.clear();
    }
}

impl Drop for NodeInfoList {
    fn drop(&mut self) {
        if self.0.iter().any(|n| n.conn.is_some()) {
            tracing::error!(
                "NodeInfoList dropped with open peer sessions still attached; this is a bug \
                 in the caller, which should have called close_all() on every exit path"
            );
        }
    }
}

/// Per-node voting flag persisted in the metadata database. Acts as a mutex:
/// a node that already received a vote request cannot become a candidate; a
/// node that already initiated cannot vote for another candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingStatus {
    NoVote,
    VoteRequestReceived,
    VoteInitiated,
    Unknown,
}

impl Default for VotingStatus {
    fn default() -> Self {
        VotingStatus::NoVote
    }
}

/// Monotonically increasing term allocated when a node transitions
/// `NoVote -> VoteInitiated`. Tags candidacy announcements so stale ones from
/// an earlier election can be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElectoralTerm(pub i64);

impl fmt::Display for ElectoralTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The orchestrator's progress through a single failover episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverState {
    None,
    Promoted,
    PromotionFailed,
    PrimaryReappeared,
    LocalNodeFailure,
    WaitingNewPrimary,
    FollowedNewPrimary,
    FollowingOriginalPrimary,
    NoNewPrimary,
    FollowFail,
    NodeNotificationError,
    Unknown,
}

/// Outcome of [`crate::core::election::do_election`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionResult {
    Won,
    Lost,
    NotCandidate,
}

/// Reachability verdict from [`crate::core::metadata::MetadataClient::try_reconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Up,
    Down,
}
