// tests/property/election_test.rs

//! Property-based tests for the tie-break rule consulted on a `Lost` outcome.

use proptest::prelude::*;
use repguard::core::election::poll_best_candidate;
use repguard::core::model::{NodeInfo, NodeType};

fn node(id: i64, lsn: u64, priority: i32) -> NodeInfo {
    let mut n = NodeInfo::new(
        id,
        format!("node{id}"),
        format!("host=node{id}"),
        NodeType::Standby,
        Some(1),
        priority,
        true,
    );
    n.last_wal_receive_lsn = lsn;
    n
}

#[test]
fn tie_break_prefers_highest_lsn() {
    let self_node = node(1, 100, 80);
    let siblings = vec![node(2, 101, 100), node(3, 100, 90)];
    let best = poll_best_candidate(&self_node, &siblings);
    assert_eq!(best.node_id, 2);
}

#[test]
fn tie_break_falls_back_to_priority_on_equal_lsn() {
    let self_node = node(1, 100, 100);
    let siblings = vec![node(2, 100, 90), node(3, 100, 80)];
    let best = poll_best_candidate(&self_node, &siblings);
    assert_eq!(best.node_id, 1);
}

#[test]
fn tie_break_falls_back_to_lowest_node_id_on_full_tie() {
    let self_node = node(5, 100, 100);
    let siblings = vec![node(2, 100, 100), node(9, 100, 100)];
    let best = poll_best_candidate(&self_node, &siblings);
    assert_eq!(best.node_id, 2);
}

#[test]
fn self_is_initial_best_candidate_on_symmetric_tie() {
    let self_node = node(5, 100, 100);
    let siblings = vec![node(7, 100, 100)];
    let best = poll_best_candidate(&self_node, &siblings);
    assert_eq!(best.node_id, 5);
}

proptest! {
    /// Whatever candidates are offered, the tie-break never hands back a
    /// node with a lower LSN than the best one actually present — the
    /// primary ordering key in the tie-break rule must never
    /// be overridden by priority or node id.
    #[test]
    fn tie_break_never_prefers_a_lagging_candidate(
        self_lsn in 0u64..10_000,
        self_priority in 0i32..1000,
        sibling_lsns in prop::collection::vec(0u64..10_000, 0..8),
        sibling_priorities in prop::collection::vec(0i32..1000, 0..8),
    ) {
        let self_node = node(1, self_lsn, self_priority);
        let siblings: Vec<NodeInfo> = sibling_lsns
            .iter()
            .enumerate()
            .map(|(i, &lsn)| {
                let priority = sibling_priorities
                    .get(i % sibling_priorities.len().max(1))
                    .copied()
                    .unwrap_or(0);
                node(i as i64 + 2, lsn, priority)
            })
            .collect();

        let max_lsn = siblings
            .iter()
            .map(|n| n.last_wal_receive_lsn)
            .chain(std::iter::once(self_lsn))
            .max()
            .unwrap();

        let best = poll_best_candidate(&self_node, &siblings);
        prop_assert_eq!(best.last_wal_receive_lsn, max_lsn);
    }
}
