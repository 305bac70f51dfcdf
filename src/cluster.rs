//! Cluster
//!
//! One configured simulation run: the node table, its subscribers and
//! the random source used to pick failure detectors. Every operation is
//! synchronous and emits its events before returning.

use std::sync::Arc;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, Subscribers};
use crate::state::{
    election, failure, ClusterSummary, FailOutcome, NodeId, NodeSnapshot, NodeStore,
};

/// A configured set of nodes running the Bully protocol
pub struct Cluster {
    store: NodeStore,
    subscribers: Subscribers,
    rng: StdRng,
}

impl Cluster {
    /// Build a cluster, rejecting the configuration as a whole on any error
    pub fn configure(
        ids: &[NodeId],
        initial_leader_id: NodeId,
        min_size: usize,
        max_size: usize,
    ) -> Result<Self> {
        let store = NodeStore::create(ids, initial_leader_id, min_size, max_size)?;

        tracing::info!(
            "Cluster configured with {} nodes, P{} is the initial coordinator",
            store.len(),
            initial_leader_id
        );

        Ok(Self {
            store,
            subscribers: Subscribers::new(),
            rng: StdRng::from_entropy(),
        })
    }

    /// Build a cluster from the `[cluster]` configuration section
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;
        let leader = config
            .initial_leader_id()
            .ok_or_else(|| Error::Config("cluster.ids cannot be empty".into()))?;

        let cluster = Self::configure(&config.ids, leader, config.min_size, config.max_size)?;
        Ok(match config.seed {
            Some(seed) => cluster.with_seed(seed),
            None => cluster,
        })
    }

    /// Use a fixed seed for the random choices this cluster makes
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Register an event consumer
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.subscribers.subscribe(sink);
    }

    /// Fail a node; a leader failure leaves a re-election to be scheduled
    pub fn fail(&mut self, id: NodeId) -> Result<FailOutcome> {
        failure::fail(&mut self.store, &self.subscribers, id)
    }

    /// Fail a random active follower and return its id
    pub fn fail_random_non_leader(&mut self) -> Result<NodeId> {
        failure::fail_random_non_leader(&mut self.store, &self.subscribers, &mut self.rng)
    }

    /// Fail the current leader
    pub fn fail_leader(&mut self) -> Result<FailOutcome> {
        failure::fail_leader(&mut self.store, &self.subscribers)
    }

    pub fn recover(&mut self, id: NodeId) -> Result<bool> {
        failure::recover(&mut self.store, &self.subscribers, id)
    }

    /// Recover every failed node, returning the recovered ids
    pub fn recover_all(&mut self) -> Result<Vec<NodeId>> {
        failure::recover_all(&mut self.store, &self.subscribers)
    }

    /// Manually start an election from `id`
    pub fn start_election(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        election::start_election(&mut self.store, &self.subscribers, id)
    }

    /// Let a random active node notice the missing coordinator and elect a new one
    pub fn elect_after_failure(&mut self) -> Result<Option<NodeId>> {
        failure::elect_after_failure(&mut self.store, &self.subscribers, &mut self.rng)
    }

    /// Whether active nodes exist without an active leader
    pub fn needs_election(&self) -> bool {
        failure::needs_election(&self.store)
    }

    pub fn leader(&self) -> Option<NodeId> {
        self.store.active_leader()
    }

    /// Ordered view of every node
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.store.snapshot()
    }

    pub fn summary(&self) -> ClusterSummary {
        self.store.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ElectionEvent, EventKind, EventLog};
    use crate::state::{NodeRole, NodeStatus};

    fn cluster(ids: &[NodeId], leader: NodeId) -> (Cluster, EventLog) {
        let log = EventLog::new();
        let mut cluster = Cluster::configure(ids, leader, 3, 10).unwrap().with_seed(42);
        cluster.subscribe(Arc::new(log.clone()));
        (cluster, log)
    }

    /// Leader is the highest active id and every active node follows it
    fn assert_invariants(cluster: &Cluster) {
        let snapshot = cluster.snapshot();
        let leaders: Vec<_> = snapshot.iter().filter(|n| n.role == NodeRole::Leader).collect();
        assert!(leaders.len() <= 1);

        let active: Vec<_> = snapshot.iter().filter(|n| n.status == NodeStatus::Active).collect();
        if let Some(max) = active.iter().map(|n| n.id).max() {
            assert_eq!(cluster.leader(), Some(max));
            for node in active {
                assert_eq!(node.coordinator_id, Some(max));
            }
        }
        for node in snapshot.iter().filter(|n| n.status == NodeStatus::Failed) {
            assert_eq!(node.role, NodeRole::Follower);
        }
    }

    #[test]
    fn test_scenario_cascading_leader_failures() {
        let (mut cluster, log) = cluster(&[1, 2, 3, 4, 5], 5);

        for expected in [4, 3, 2, 1] {
            let outcome = cluster.fail_leader().unwrap();
            assert_eq!(outcome, FailOutcome::LeaderFailed);
            assert_eq!(cluster.elect_after_failure().unwrap(), Some(expected));
            assert_invariants(&cluster);
        }

        // P1 is the only active node and stays leader until it fails too
        assert_eq!(cluster.leader(), Some(1));
        log.clear();
        assert_eq!(cluster.fail(1).unwrap(), FailOutcome::Leaderless);
        assert_eq!(log.count(EventKind::Leaderless), 1);
        assert_eq!(log.count(EventKind::Elected), 0);
        assert_eq!(cluster.leader(), None);
        assert!(!cluster.needs_election());
    }

    #[test]
    fn test_scenario_size_below_minimum() {
        let err = Cluster::configure(&[1, 2], 1, 3, 10).err().unwrap();
        assert!(matches!(err, Error::ClusterSize { size: 2, min: 3, max: 10 }));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_scenario_duplicate_id() {
        let err = Cluster::configure(&[1, 1, 2], 2, 3, 10).err().unwrap();
        assert!(matches!(err, Error::DuplicateNodeId(1)));
    }

    #[test]
    fn test_scenario_recover_active_is_noop() {
        let (mut cluster, log) = cluster(&[1, 2, 3], 3);

        assert!(!cluster.recover(2).unwrap());
        assert!(log.is_empty());

        cluster.fail(3).unwrap();
        assert_eq!(cluster.elect_after_failure().unwrap(), Some(2));
        assert_invariants(&cluster);
    }

    #[test]
    fn test_convergence_from_any_active_initiator() {
        for initiator in 1..=6 {
            let (mut cluster, _log) = cluster(&[1, 2, 3, 4, 5, 6, 7], 7);
            cluster.fail(7).unwrap();
            cluster.fail(5).unwrap();

            if initiator == 5 {
                assert_eq!(cluster.start_election(initiator).unwrap(), None);
                continue;
            }
            assert_eq!(cluster.start_election(initiator).unwrap(), Some(6));
            assert_invariants(&cluster);
        }
    }

    #[test]
    fn test_recovered_high_node_does_not_usurp() {
        let (mut cluster, log) = cluster(&[1, 2, 3, 4], 4);
        cluster.fail(4).unwrap();
        cluster.elect_after_failure().unwrap();
        log.clear();

        assert_eq!(cluster.recover_all().unwrap(), vec![4]);
        assert_eq!(cluster.leader(), Some(3));
        assert_eq!(log.count(EventKind::Elected), 0);
        assert!(!cluster.needs_election());

        // The next leader failure lets the highest node win again
        cluster.fail(3).unwrap();
        assert_eq!(cluster.elect_after_failure().unwrap(), Some(4));
    }

    #[test]
    fn test_recovery_after_leaderless_needs_election() {
        let (mut cluster, _log) = cluster(&[1, 2, 3], 3);
        for id in [1, 2, 3] {
            cluster.fail(id).unwrap();
        }

        cluster.recover_all().unwrap();
        assert!(cluster.needs_election());
        for node in cluster.snapshot() {
            assert_eq!(node.coordinator_id, None);
        }

        assert_eq!(cluster.elect_after_failure().unwrap(), Some(3));
        assert_invariants(&cluster);
    }

    #[test]
    fn test_from_config_uses_default_leader_and_seed() {
        let mut config = ClusterConfig::sequential(4);
        config.seed = Some(9);

        let mut first = Cluster::from_config(&config).unwrap();
        let mut second = Cluster::from_config(&config).unwrap();
        assert_eq!(first.leader(), Some(4));

        // Same seed, same choice of victim
        assert_eq!(
            first.fail_random_non_leader().unwrap(),
            second.fail_random_non_leader().unwrap()
        );
    }

    #[test]
    fn test_events_arrive_in_cascade_order() {
        let (mut cluster, log) = cluster(&[1, 2, 3], 3);
        cluster.fail(3).unwrap();
        log.clear();

        cluster.start_election(1).unwrap();

        assert_eq!(
            log.events(),
            vec![
                ElectionEvent::Started { initiator: 1 },
                ElectionEvent::election(1, 2),
                ElectionEvent::ok(2, 1),
                ElectionEvent::Started { initiator: 2 },
                ElectionEvent::Elected { leader: 2, previous: None },
            ]
        );
    }

    #[test]
    fn test_unknown_ids() {
        let (mut cluster, _log) = cluster(&[1, 2, 3], 3);
        assert!(matches!(cluster.fail(10), Err(Error::NodeNotFound(10))));
        assert!(matches!(cluster.start_election(10), Err(Error::NodeNotFound(10))));
        assert!(matches!(cluster.recover(10), Err(Error::NodeNotFound(10))));
    }
}
