//! bully-sim - Bully Leader Election Simulator
//!
//! Simulates the Bully leader-election protocol over a fixed set of
//! uniquely numbered nodes, modeling coordinator failure, election
//! cascades, and recovery.
//!
//! # Architecture
//!
//! A [`Cluster`] owns the node table for one simulation run. The election
//! cascade and failure handling are plain functions over that table in
//! [`state`], emitting [`events::ElectionEvent`]s to caller-owned sinks in
//! the order they happen. [`Simulation`] wraps a cluster for async use and
//! owns the re-election delay and the periodic failure detector.
//!
//! # Features
//!
//! - Deterministic convergence on the highest active id
//! - Depth-first cascade bounded by cluster size
//! - Failure injection, recovery, and leaderless detection
//! - Automatic failure detection loop
//! - TOML configuration and seeded, reproducible runs

pub mod config;
pub mod error;
pub mod events;
pub mod state;
pub mod cluster;
pub mod simulation;

pub use config::BullyConfig;
pub use error::{Error, Result};
pub use cluster::Cluster;
pub use simulation::Simulation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cluster::Cluster;
    pub use crate::config::BullyConfig;
    pub use crate::error::{Error, Result};
    pub use crate::events::{ElectionEvent, EventKind, EventLog, EventSink, TracingSink};
    pub use crate::simulation::Simulation;
    pub use crate::state::{FailOutcome, NodeId, NodeRole, NodeSnapshot, NodeStatus};
}
