// src/core/mock.rs

//! An in-memory stand-in for [`MetadataClient`], used to exercise the
//! Election Engine and Failover Orchestrator without a live Postgres
//! instance.

#![cfg(test)]

use crate::core::errors::Result;
use crate::core::metadata::{EventTag, MetadataClient};
use crate::core::model::{ElectoralTerm, NodeInfo, NodeType, VotingStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MockNodeState {
    pub record: NodeInfo,
    pub voting_status: VotingStatus,
    pub term: i64,
    pub new_primary: Option<i64>,
    pub reachable: bool,
    pub votes_granted: bool,
}

impl MockNodeState {
    pub fn new(record: NodeInfo) -> Self {
        Self {
            record,
            voting_status: VotingStatus::NoVote,
            term: 0,
            new_primary: None,
            reachable: true,
            votes_granted: true,
        }
    }
}

/// Peer handle: just the node id, looked up in the shared table on every
/// call. Cheap to clone, which is why `Peer: Send + 'static` is enough.
#[derive(Debug, Clone, Copy)]
pub struct MockPeer(pub i64);

#[derive(Clone, Default)]
pub struct MockMetadataClient {
    nodes: Arc<Mutex<HashMap<i64, MockNodeState>>>,
    next_term: Arc<Mutex<i64>>,
}

impl MockMetadataClient {
    pub fn new(records: Vec<NodeInfo>) -> Self {
        let mut nodes = HashMap::new();
        for record in records {
            nodes.insert(record.node_id, MockNodeState::new(record));
        }
        Self {
            nodes: Arc::new(Mutex::new(nodes)),
            next_term: Arc::new(Mutex::new(0)),
        }
    }

    pub fn set_reachable(&self, node_id: i64, reachable: bool) {
        if let Some(state) = self.nodes.lock().get_mut(&node_id) {
            state.reachable = reachable;
        }
    }

    pub fn set_votes_granted(&self, node_id: i64, granted: bool) {
        if let Some(state) = self.nodes.lock().get_mut(&node_id) {
            state.votes_granted = granted;
        }
    }

    pub fn set_lsn(&self, node_id: i64, lsn: u64) {
        if let Some(state) = self.nodes.lock().get_mut(&node_id) {
            state.record.last_wal_receive_lsn = lsn;
        }
    }

    pub fn voting_status_of(&self, node_id: i64) -> VotingStatus {
        self.nodes.lock().get(&node_id).map(|s| s.voting_status).unwrap_or(VotingStatus::Unknown)
    }

    fn conninfo_to_id(&self, conninfo: &str) -> Option<i64> {
        self.nodes
            .lock()
            .values()
            .find(|s| s.record.conninfo == conninfo)
            .map(|s| s.record.node_id)
    }
}

#[async_trait]
impl MetadataClient for MockMetadataClient {
    type Peer = MockPeer;

    async fn connect_peer(&self, conninfo: &str) -> Result<Self::Peer> {
        match self.conninfo_to_id(conninfo) {
            Some(id) if self.nodes.lock().get(&id).map(|s| s.reachable).unwrap_or(false) => {
                Ok(MockPeer(id))
            }
            _ => Err(crate::core::errors::RepguardError::PeerUnreachable(
                conninfo.to_string(),
            )),
        }
    }

    async fn close_peer(&self, _peer: Self::Peer) {}

    async fn is_peer_available(&self, conninfo: &str) -> bool {
        self.conninfo_to_id(conninfo)
            .and_then(|id| self.nodes.lock().get(&id).map(|s| s.reachable))
            .unwrap_or(false)
    }

    async fn get_node_record(&self, session: &mut Self::Peer, node_id: i64) -> Result<Option<NodeInfo>> {
        let _ = session;
        Ok(self.nodes.lock().get(&node_id).map(|s| s.record.clone()))
    }

    async fn get_active_sibling_node_records(
        &self,
        session: &mut Self::Peer,
        self_id: i64,
        upstream_id: i64,
    ) -> Result<Vec<NodeInfo>> {
        let _ = session;
        Ok(self
            .nodes
            .lock()
            .values()
            .filter(|s| {
                s.record.active
                    && s.record.node_id != self_id
                    && s.record.upstream_node_id == Some(upstream_id)
            })
            .map(|s| s.record.clone())
            .collect())
    }

    async fn get_voting_status(&self, session: &mut Self::Peer) -> Result<VotingStatus> {
        Ok(self
            .nodes
            .lock()
            .get(&session.0)
            .map(|s| s.voting_status)
            .unwrap_or(VotingStatus::Unknown))
    }

    async fn set_voting_status_initiated(&self, session: &mut Self::Peer) -> Result<ElectoralTerm> {
        let mut term_counter = self.next_term.lock();
        *term_counter += 1;
        let term = *term_counter;
        if let Some(state) = self.nodes.lock().get_mut(&session.0) {
            state.voting_status = VotingStatus::VoteInitiated;
            state.term = term;
        }
        Ok(ElectoralTerm(term))
    }

    async fn reset_voting_status(&self, session: &mut Self::Peer) -> Result<()> {
        if let Some(state) = self.nodes.lock().get_mut(&session.0) {
            state.voting_status = VotingStatus::NoVote;
        }
        Ok(())
    }

    async fn get_last_wal_receive_location(&self, session: &mut Self::Peer) -> Result<u64> {
        Ok(self
            .nodes
            .lock()
            .get(&session.0)
            .map(|s| s.record.last_wal_receive_lsn)
            .unwrap_or(0))
    }

    async fn get_recovery_type(&self, session: &mut Self::Peer) -> Result<NodeType> {
        Ok(self
            .nodes
            .lock()
            .get(&session.0)
            .map(|s| s.record.node_type)
            .unwrap_or(NodeType::Unknown))
    }

    async fn get_primary_connection(&self, session: &mut Self::Peer) -> Result<(Self::Peer, i64)> {
        let _ = session;
        let primary_id = self
            .nodes
            .lock()
            .values()
            .find(|s| s.record.node_type == NodeType::Primary)
            .map(|s| s.record.node_id);
        match primary_id {
            Some(id) => Ok((MockPeer(id), id)),
            None => Err(crate::core::errors::RepguardError::PeerUnreachable(
                "no primary".to_string(),
            )),
        }
    }

    async fn announce_candidature(
        &self,
        peer: &mut Self::Peer,
        _self_id: i64,
        term: ElectoralTerm,
    ) -> Result<bool> {
        let mut nodes = self.nodes.lock();
        let state = nodes.get_mut(&peer.0).expect("peer node exists");
        if state.voting_status == VotingStatus::VoteInitiated && state.term >= term.0 {
            return Ok(false);
        }
        state.voting_status = VotingStatus::VoteRequestReceived;
        Ok(true)
    }

    async fn request_vote(
        &self,
        peer: &mut Self::Peer,
        _self_id: i64,
        _term: ElectoralTerm,
    ) -> Result<(u32, u64)> {
        let nodes = self.nodes.lock();
        let state = nodes.get(&peer.0).expect("peer node exists");
        let vote = if state.votes_granted { 1 } else { 0 };
        Ok((vote, state.record.last_wal_receive_lsn))
    }

    async fn notify_follow_primary(&self, peer: &mut Self::Peer, new_primary_id: i64) -> Result<()> {
        if let Some(state) = self.nodes.lock().get_mut(&peer.0) {
            state.new_primary = Some(new_primary_id);
        }
        Ok(())
    }

    async fn get_new_primary(&self, session: &mut Self::Peer) -> Result<Option<i64>> {
        Ok(self.nodes.lock().get(&session.0).and_then(|s| s.new_primary))
    }

    async fn create_event_record(
        &self,
        _session: Option<&mut Self::Peer>,
        _node_id: i64,
        _event: EventTag,
        _success: bool,
        _detail: &str,
    ) {
    }
}
