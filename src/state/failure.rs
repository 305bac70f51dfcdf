//! Failure Injection
//!
//! Fails and recovers nodes and decides when the cluster needs a new
//! election. Failure detection is distributed: any active node may be the
//! one that notices the coordinator is gone.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};
use crate::events::{ElectionEvent, EventSink};
use crate::state::{election, NodeId, NodeRole, NodeStatus, NodeStore};

/// What a call to [`fail`] changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Node was already failed
    Unchanged,
    /// A follower failed; leadership is unaffected
    Failed,
    /// The leader failed and a re-election must be scheduled
    LeaderFailed,
    /// No active node remains
    Leaderless,
}

impl FailOutcome {
    pub fn needs_reelection(&self) -> bool {
        matches!(self, FailOutcome::LeaderFailed)
    }
}

/// Mark a node as failed
pub fn fail(store: &mut NodeStore, sink: &dyn EventSink, id: NodeId) -> Result<FailOutcome> {
    let node = store.get(id)?;
    if !node.is_active() {
        return Ok(FailOutcome::Unchanged);
    }
    let was_leader = node.is_leader();

    store.set_status(id, NodeStatus::Failed)?;
    if was_leader {
        store.set_role(id, NodeRole::Follower)?;
    }

    tracing::warn!("P{} failed (leader: {})", id, was_leader);
    sink.on_event(&ElectionEvent::Failed { id, was_leader });

    if store.active_nodes().is_empty() {
        tracing::error!("No active nodes remain, cluster is leaderless");
        sink.on_event(&ElectionEvent::Leaderless);
        return Ok(FailOutcome::Leaderless);
    }

    if was_leader {
        Ok(FailOutcome::LeaderFailed)
    } else {
        Ok(FailOutcome::Failed)
    }
}

/// Bring a failed node back as a follower of the current leader
///
/// Returns `false` if the node was already active. Recovery never starts
/// an election, even when the recovered id outranks the leader.
pub fn recover(store: &mut NodeStore, sink: &dyn EventSink, id: NodeId) -> Result<bool> {
    if store.get(id)?.is_active() {
        return Ok(false);
    }

    let leader = store.active_leader();
    store.set_status(id, NodeStatus::Active)?;
    store.set_role(id, NodeRole::Follower)?;
    store.set_coordinator(id, leader)?;

    tracing::info!("P{} recovered", id);
    sink.on_event(&ElectionEvent::Recovered { id });

    Ok(true)
}

/// Whether active nodes exist but none of them leads
pub fn needs_election(store: &NodeStore) -> bool {
    store.active_leader().is_none() && !store.active_nodes().is_empty()
}

/// Run the re-election that follows a coordinator failure
///
/// A random active node detects the failure and starts the election.
/// No-op if an active leader already exists or every node has failed.
pub fn elect_after_failure<R: Rng + ?Sized>(
    store: &mut NodeStore,
    sink: &dyn EventSink,
    rng: &mut R,
) -> Result<Option<NodeId>> {
    if !needs_election(store) {
        return Ok(None);
    }

    let active = store.active_nodes();
    let detector = match active.choose(rng) {
        Some(id) => *id,
        None => return Ok(None),
    };
    let failed_leader = store.get(detector)?.coordinator_id;

    tracing::warn!("P{} detected coordinator failure, starting election", detector);
    sink.on_event(&ElectionEvent::Detected { detector, failed_leader });

    election::start_election(store, sink, detector)
}

/// Fail a random active node that does not hold the leader role
pub fn fail_random_non_leader<R: Rng + ?Sized>(
    store: &mut NodeStore,
    sink: &dyn EventSink,
    rng: &mut R,
) -> Result<NodeId> {
    let eligible: Vec<NodeId> = store
        .all()
        .filter(|n| n.is_active() && !n.is_leader())
        .map(|n| n.id)
        .collect();

    let id = *eligible.choose(rng).ok_or(Error::NoEligibleNode)?;
    fail(store, sink, id)?;
    Ok(id)
}

/// Fail the current leader
pub fn fail_leader(store: &mut NodeStore, sink: &dyn EventSink) -> Result<FailOutcome> {
    let leader = store.active_leader().ok_or(Error::NoLeader)?;
    fail(store, sink, leader)
}

/// Recover every failed node, returning the recovered ids
pub fn recover_all(store: &mut NodeStore, sink: &dyn EventSink) -> Result<Vec<NodeId>> {
    let failed: Vec<NodeId> = store
        .all()
        .filter(|n| !n.is_active())
        .map(|n| n.id)
        .collect();

    for id in &failed {
        recover(store, sink, *id)?;
    }

    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, EventLog};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store(ids: &[NodeId], leader: NodeId) -> NodeStore {
        NodeStore::create(ids, leader, 3, 10).unwrap()
    }

    #[test]
    fn test_fail_follower() {
        let mut store = store(&[1, 2, 3], 3);
        let log = EventLog::new();

        assert_eq!(fail(&mut store, &log, 1).unwrap(), FailOutcome::Failed);
        assert_eq!(store.get(1).unwrap().status, NodeStatus::Failed);
        assert_eq!(store.active_leader(), Some(3));
        assert_eq!(log.events(), vec![ElectionEvent::Failed { id: 1, was_leader: false }]);
    }

    #[test]
    fn test_fail_leader_clears_role() {
        let mut store = store(&[1, 2, 3], 3);
        let log = EventLog::new();

        let outcome = fail(&mut store, &log, 3).unwrap();

        assert_eq!(outcome, FailOutcome::LeaderFailed);
        assert!(outcome.needs_reelection());
        assert_eq!(store.get(3).unwrap().role, NodeRole::Follower);
        assert_eq!(store.leader(), None);
        assert!(needs_election(&store));
        assert_eq!(log.count(EventKind::Elected), 0);
    }

    #[test]
    fn test_fail_is_idempotent() {
        let mut store = store(&[1, 2, 3], 3);
        let log = EventLog::new();
        fail(&mut store, &log, 2).unwrap();
        log.clear();

        assert_eq!(fail(&mut store, &log, 2).unwrap(), FailOutcome::Unchanged);
        assert!(log.is_empty());
    }

    #[test]
    fn test_fail_unknown_node() {
        let mut store = store(&[1, 2, 3], 3);
        let log = EventLog::new();
        assert!(matches!(fail(&mut store, &log, 8), Err(Error::NodeNotFound(8))));
        assert!(matches!(recover(&mut store, &log, 8), Err(Error::NodeNotFound(8))));
    }

    #[test]
    fn test_last_active_node_leaves_cluster_leaderless() {
        let mut store = store(&[1, 2, 3], 1);
        let log = EventLog::new();
        fail(&mut store, &log, 2).unwrap();
        fail(&mut store, &log, 3).unwrap();
        log.clear();

        assert_eq!(fail(&mut store, &log, 1).unwrap(), FailOutcome::Leaderless);
        assert_eq!(log.count(EventKind::Leaderless), 1);
        assert_eq!(log.count(EventKind::Elected), 0);
        assert!(!needs_election(&store));

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(elect_after_failure(&mut store, &log, &mut rng).unwrap(), None);
    }

    #[test]
    fn test_elect_after_failure_picks_highest_active() {
        let mut store = store(&[1, 2, 3, 4, 5], 5);
        let log = EventLog::new();
        let mut rng = StdRng::seed_from_u64(7);

        fail(&mut store, &log, 5).unwrap();
        let winner = elect_after_failure(&mut store, &log, &mut rng).unwrap();

        assert_eq!(winner, Some(4));
        assert_eq!(store.active_leader(), Some(4));
        let detected = log
            .events()
            .into_iter()
            .find(|e| e.kind() == EventKind::Detected)
            .unwrap();
        assert!(matches!(detected, ElectionEvent::Detected { failed_leader: Some(5), .. }));

        // Leader is back; a second detection changes nothing
        log.clear();
        assert_eq!(elect_after_failure(&mut store, &log, &mut rng).unwrap(), None);
        assert!(log.is_empty());
    }

    #[test]
    fn test_recover_keeps_current_leader() {
        let mut store = store(&[1, 2, 3], 3);
        let log = EventLog::new();
        let mut rng = StdRng::seed_from_u64(3);

        fail(&mut store, &log, 3).unwrap();
        elect_after_failure(&mut store, &log, &mut rng).unwrap();
        log.clear();

        assert!(recover(&mut store, &log, 3).unwrap());
        let node = store.get(3).unwrap();
        assert!(node.is_active());
        assert_eq!(node.role, NodeRole::Follower);
        assert_eq!(node.coordinator_id, Some(2));
        assert_eq!(store.active_leader(), Some(2));
        assert_eq!(log.events(), vec![ElectionEvent::Recovered { id: 3 }]);

        // Already active
        log.clear();
        assert!(!recover(&mut store, &log, 3).unwrap());
        assert!(log.is_empty());
    }

    #[test]
    fn test_fail_random_non_leader() {
        let mut store = store(&[1, 2, 3], 3);
        let log = EventLog::new();
        let mut rng = StdRng::seed_from_u64(11);

        let first = fail_random_non_leader(&mut store, &log, &mut rng).unwrap();
        let second = fail_random_non_leader(&mut store, &log, &mut rng).unwrap();

        assert_ne!(first, 3);
        assert_ne!(second, 3);
        assert_ne!(first, second);
        assert!(matches!(
            fail_random_non_leader(&mut store, &log, &mut rng),
            Err(Error::NoEligibleNode)
        ));
        assert_eq!(store.active_leader(), Some(3));
    }

    #[test]
    fn test_fail_leader_without_leader() {
        let mut store = store(&[1, 2, 3], 3);
        let log = EventLog::new();

        assert_eq!(fail_leader(&mut store, &log).unwrap(), FailOutcome::LeaderFailed);
        assert!(matches!(fail_leader(&mut store, &log), Err(Error::NoLeader)));
    }

    #[test]
    fn test_recover_all() {
        let mut store = store(&[1, 2, 3, 4], 4);
        let log = EventLog::new();
        fail(&mut store, &log, 1).unwrap();
        fail(&mut store, &log, 3).unwrap();
        log.clear();

        assert_eq!(recover_all(&mut store, &log).unwrap(), vec![1, 3]);
        assert_eq!(store.active_nodes(), vec![1, 2, 3, 4]);
        assert_eq!(log.count(EventKind::Recovered), 2);
        assert!(recover_all(&mut store, &log).unwrap().is_empty());
    }
}
