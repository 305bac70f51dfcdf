//! Simulation Driver
//!
//! Async front-end over a [`Cluster`]. Every call is serialized through a
//! single mutex so failures, recoveries and elections never interleave.
//! Owns the two timers of the simulation: the short delay between a
//! leader failure and its re-election, and the periodic failure detector.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::cluster::Cluster;
use crate::config::BullyConfig;
use crate::error::Result;
use crate::events::EventSink;
use crate::state::{ClusterSummary, FailOutcome, NodeId, NodeSnapshot};

/// Running failure-detection loop
struct Detector {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Shared, serialized access to one cluster plus its timers
pub struct Simulation {
    cluster: Arc<Mutex<Cluster>>,
    reelection_delay: Duration,
    detection_interval: Duration,
    detector: Mutex<Option<Detector>>,
}

impl Simulation {
    /// Create a simulation around an already configured cluster
    pub fn new(cluster: Cluster, reelection_delay: Duration, detection_interval: Duration) -> Self {
        Self {
            cluster: Arc::new(Mutex::new(cluster)),
            reelection_delay,
            detection_interval,
            detector: Mutex::new(None),
        }
    }

    /// Configure a cluster and its timers from a configuration file
    pub fn from_config(config: &BullyConfig) -> Result<Self> {
        config.validate()?;
        let cluster = Cluster::from_config(&config.cluster)?;
        Ok(Self::new(cluster, config.reelection_delay(), config.detection_interval()))
    }

    pub async fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.cluster.lock().await.subscribe(sink);
    }

    /// Fail a node, scheduling a re-election if it was the leader
    pub async fn fail(&self, id: NodeId) -> Result<FailOutcome> {
        let outcome = self.cluster.lock().await.fail(id)?;
        self.after_failure(outcome);
        Ok(outcome)
    }

    /// Fail the current leader and schedule its replacement
    pub async fn fail_leader(&self) -> Result<FailOutcome> {
        let outcome = self.cluster.lock().await.fail_leader()?;
        self.after_failure(outcome);
        Ok(outcome)
    }

    pub async fn fail_random_non_leader(&self) -> Result<NodeId> {
        self.cluster.lock().await.fail_random_non_leader()
    }

    pub async fn recover(&self, id: NodeId) -> Result<bool> {
        self.cluster.lock().await.recover(id)
    }

    pub async fn recover_all(&self) -> Result<Vec<NodeId>> {
        self.cluster.lock().await.recover_all()
    }

    pub async fn start_election(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.cluster.lock().await.start_election(id)
    }

    pub async fn leader(&self) -> Option<NodeId> {
        self.cluster.lock().await.leader()
    }

    pub async fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.cluster.lock().await.snapshot()
    }

    pub async fn summary(&self) -> ClusterSummary {
        self.cluster.lock().await.summary()
    }

    fn after_failure(&self, outcome: FailOutcome) {
        if outcome.needs_reelection() {
            self.schedule_reelection();
        }
    }

    /// Run the post-failure election after the configured delay
    ///
    /// The delay only gives observers time to see the cluster without a
    /// leader; the election re-checks the cluster when it fires.
    fn schedule_reelection(&self) {
        let cluster = Arc::clone(&self.cluster);
        let delay = self.reelection_delay;

        tracing::debug!("Re-election scheduled in {} ms", delay.as_millis());
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            run_reelection(&cluster).await;
        });
    }

    /// Start the periodic failure detector
    ///
    /// Returns `false` if it is already running.
    pub async fn start_failure_detection(&self) -> bool {
        let mut detector = self.detector.lock().await;
        if detector.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            return false;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let cluster = Arc::clone(&self.cluster);
        let period = self.detection_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => run_reelection(&cluster).await,
                }
            }
            tracing::debug!("Failure detector stopped");
        });

        tracing::info!(
            "Automatic failure detection started, checking the coordinator every {} ms",
            period.as_millis()
        );
        *detector = Some(Detector { stop_tx, handle });
        true
    }

    /// Stop the periodic failure detector
    ///
    /// Cancels the next tick only; an election already running completes.
    /// Returns `false` if it was not running.
    pub async fn stop_failure_detection(&self) -> bool {
        let Some(detector) = self.detector.lock().await.take() else {
            return false;
        };

        let _ = detector.stop_tx.send(());
        if let Err(e) = detector.handle.await {
            tracing::warn!("Failure detector ended abnormally: {}", e);
        }
        tracing::info!("Automatic failure detection stopped");
        true
    }

    pub async fn is_detecting(&self) -> bool {
        self.detector
            .lock()
            .await
            .as_ref()
            .is_some_and(|d| !d.handle.is_finished())
    }
}

async fn run_reelection(cluster: &Mutex<Cluster>) {
    let mut cluster = cluster.lock().await;
    if !cluster.needs_election() {
        return;
    }

    match cluster.elect_after_failure() {
        Ok(Some(leader)) => tracing::debug!("Re-election finished, P{} leads", leader),
        Ok(None) => {}
        Err(e) => tracing::error!("Re-election failed: {}", e),
    }
}
