//! State Management Module
//!
//! Node records, the Bully election cascade, and failure injection.

mod membership;
pub mod election;
pub mod failure;

pub use membership::{ClusterSummary, Node, NodeId, NodeRole, NodeSnapshot, NodeStatus, NodeStore};
pub use failure::FailOutcome;
