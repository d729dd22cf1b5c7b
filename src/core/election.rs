// src/core/election.rs

//! The Election Engine: runs the leader-election protocol a standby executes
//! against its siblings once its upstream has been declared down. Implements
//! the nine-step protocol and the tie-break
//! rule consulted on a `Lost` outcome.

use crate::core::errors::Result;
use crate::core::metadata::MetadataClient;
use crate::core::model::{ElectionResult, ElectoralTerm, NodeInfo, NodeInfoList, VotingStatus};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a single election round: the verdict plus the sibling set,
/// annotated with visibility and LSN, sessions already closed.
pub struct ElectionOutcome {
    pub result: ElectionResult,
    pub term: Option<ElectoralTerm>,
    pub siblings: NodeInfoList,
}

/// Runs the election protocol. `self_node` must
/// have `last_wal_receive_lsn` left at its default; this function fills it
/// in from `local_session` as step 6 of the protocol.
pub async fn do_election<C: MetadataClient>(
    client: &C,
    local_session: &mut C::Peer,
    self_node: &NodeInfo,
) -> Result<ElectionOutcome> {
    // Step 1: jitter, to decorrelate peers that detected the failure at the
    // same instant.
    let jitter_ms = rand::thread_rng().gen_range(100..=500);
    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

    // Step 2: self-check. If another candidate on our own node already
    // claimed candidacy and recorded that we received a vote request, yield.
    if client.get_voting_status(local_session).await? == VotingStatus::VoteRequestReceived {
        debug!(
            "node {} already recorded VOTE_REQUEST_RECEIVED; not a candidate this round",
            self_node.node_id
        );
        return Ok(ElectionOutcome {
            result: ElectionResult::NotCandidate,
            term: None,
            siblings: NodeInfoList::default(),
        });
    }

    // Step 3: claim candidacy.
    let term = client.set_voting_status_initiated(local_session).await?;
    info!(
        "node {} claiming candidacy for electoral term {}",
        self_node.node_id, term
    );

    // Step 4: enumerate siblings (active standbys sharing our upstream).
    let upstream_id = self_node.upstream_node_id.unwrap_or(0);
    let sibling_records = client
        .get_active_sibling_node_records(local_session, self_node.node_id, upstream_id)
        .await?;

    if sibling_records.is_empty() {
        info!(
            "node {} is the sole surviving sibling; declaring election won",
            self_node.node_id
        );
        return Ok(ElectionOutcome {
            result: ElectionResult::Won,
            term: Some(term),
            siblings: NodeInfoList::default(),
        });
    }

    let mut siblings = NodeInfoList::new(sibling_records);

    // Step 5: announce candidacy to every sibling.
    let mut visible_count: u32 = 1; // self counts as visible.
    let mut refused = false;
    for sibling in siblings.iter_mut() {
        sibling.is_visible = false;
        let mut peer_session = match client.connect_peer(&sibling.conninfo).await {
            Ok(s) => s,
            Err(e) => {
                debug!(
                    "could not reach sibling {} during announce: {}",
                    sibling.node_id, e
                );
                continue;
            }
        };

        match client
            .announce_candidature(&mut peer_session, self_node.node_id, term)
            .await
        {
            Ok(true) => {
                sibling.is_visible = true;
                sibling.conn = Some(peer_session);
                visible_count += 1;
            }
            Ok(false) => {
                info!(
                    "sibling {} refused our candidacy for term {} (it is itself a candidate)",
                    sibling.node_id, term
                );
                client.close_peer(peer_session).await;
                refused = true;
                break;
            }
            Err(e) => {
                warn!(
                    "error announcing candidature to sibling {}: {}",
                    sibling.node_id, e
                );
                client.close_peer(peer_session).await;
            }
        }
    }

    if refused {
        siblings.close_all().await;
        client.reset_voting_status(local_session).await?;
        return Ok(ElectionOutcome {
            result: ElectionResult::NotCandidate,
            term: Some(term),
            siblings: NodeInfoList::default(),
        });
    }

    // Step 6: learn our own LSN.
    let self_lsn = client.get_last_wal_receive_location(local_session).await?;

    // Step 7: collect votes from every visible sibling.
    let mut votes_for_me: u32 = 0;
    let mut other_node_is_ahead = false;
    for sibling in siblings.iter_mut() {
        if !sibling.is_visible {
            continue;
        }
        let Some(mut peer_session) = sibling.conn.take() else {
            continue;
        };
        match client
            .request_vote(&mut peer_session, self_node.node_id, term)
            .await
        {
            Ok((vote_count, peer_lsn)) => {
                votes_for_me += vote_count;
                sibling.last_wal_receive_lsn = peer_lsn;
                if peer_lsn > self_lsn {
                    other_node_is_ahead = true;
                }
            }
            Err(e) => {
                warn!(
                    "error requesting vote from sibling {}: {}",
                    sibling.node_id, e
                );
            }
        }
        sibling.conn = Some(peer_session);
    }

    // Step 8: self-vote, suppressed if we know ourselves to be behind.
    if !other_node_is_ahead {
        votes_for_me += 1;
    }

    siblings.close_all().await;

    // Step 9: verdict. Unanimous among visible peers (including self) wins.
    let result = if votes_for_me == visible_count {
        ElectionResult::Won
    } else {
        client.reset_voting_status(local_session).await?;
        ElectionResult::Lost
    };

    info!(
        "node {} election result for term {}: {:?} ({}/{} votes)",
        self_node.node_id, term, result, votes_for_me, visible_count
    );

    Ok(ElectionOutcome {
        result,
        term: Some(term),
        siblings: NodeInfoList::new(siblings.0),
    })
}

/// Picks the best promotion candidate among `siblings`, by
/// `last_wal_receive_lsn` (desc), then `priority` (desc), then `node_id`
/// (asc). `self_node` is included as the initial best candidate, so a lone
/// symmetric tie resolves in our own favor.
pub fn poll_best_candidate<'a>(self_node: &'a NodeInfo, siblings: &'a [NodeInfo]) -> &'a NodeInfo {
    let mut best = self_node;
    for candidate in siblings {
        if is_better_candidate(candidate, best) {
            best = candidate;
        }
    }
    best
}

fn is_better_candidate(candidate: &NodeInfo, current_best: &NodeInfo) -> bool {
    match candidate
        .last_wal_receive_lsn
        .cmp(&current_best.last_wal_receive_lsn)
    {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => match candidate.priority.cmp(&current_best.priority) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => candidate.node_id < current_best.node_id,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::MockMetadataClient;
    use crate::core::model::NodeType;

    fn mock_node(id: i64, node_type: NodeType, upstream: Option<i64>) -> NodeInfo {
        NodeInfo::new(
            id,
            format!("node{id}"),
            format!("conninfo{id}"),
            node_type,
            upstream,
            100,
            true,
        )
    }

    #[tokio::test]
    async fn sole_surviving_standby_wins_unconditionally() {
        let self_node = mock_node(2, NodeType::Standby, Some(1));
        let client = MockMetadataClient::new(vec![self_node.clone()]);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = do_election(&client, &mut session, &self_node).await.unwrap();
        assert_eq!(outcome.result, ElectionResult::Won);
    }

    #[tokio::test]
    async fn three_standby_election_is_unanimous_and_wins() {
        let self_node = mock_node(2, NodeType::Standby, Some(1));
        let sib_a = mock_node(3, NodeType::Standby, Some(1));
        let sib_b = mock_node(4, NodeType::Standby, Some(1));
        let client = MockMetadataClient::new(vec![self_node.clone(), sib_a, sib_b]);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = do_election(&client, &mut session, &self_node).await.unwrap();
        assert_eq!(outcome.result, ElectionResult::Won);
    }

    #[tokio::test]
    async fn self_vote_suppressed_when_sibling_is_ahead() {
        let self_node = mock_node(2, NodeType::Standby, Some(1));
        let sib = mock_node(3, NodeType::Standby, Some(1));
        let client = MockMetadataClient::new(vec![self_node.clone(), sib]);
        client.set_lsn(3, 500);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = do_election(&client, &mut session, &self_node).await.unwrap();
        assert_eq!(outcome.result, ElectionResult::Lost);
    }

    #[tokio::test]
    async fn unreachable_sibling_is_excluded_and_election_still_wins() {
        let self_node = mock_node(2, NodeType::Standby, Some(1));
        let sib = mock_node(3, NodeType::Standby, Some(1));
        let client = MockMetadataClient::new(vec![self_node.clone(), sib]);
        client.set_reachable(3, false);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = do_election(&client, &mut session, &self_node).await.unwrap();
        assert_eq!(outcome.result, ElectionResult::Won);
    }

    #[tokio::test]
    async fn dissenting_sibling_vote_loses_the_election() {
        let self_node = mock_node(2, NodeType::Standby, Some(1));
        let sib = mock_node(3, NodeType::Standby, Some(1));
        let client = MockMetadataClient::new(vec![self_node.clone(), sib]);
        client.set_votes_granted(3, false);
        let mut session = client.connect_peer("conninfo2").await.unwrap();
        let outcome = do_election(&client, &mut session, &self_node).await.unwrap();
        assert_eq!(outcome.result, ElectionResult::Lost);
        assert_eq!(client.voting_status_of(2), VotingStatus::NoVote);
    }
}
