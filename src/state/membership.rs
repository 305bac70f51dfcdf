//! Cluster Membership Management
//!
//! Owns the node records of one simulation run and the primitives the
//! election and failure logic use to read and rewrite them.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Node identifier; numeric order is the Bully tie-break
pub type NodeId = u64;

/// Node status in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// Node is up and takes part in elections
    Active,
    /// Node has failed
    Failed,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Active => write!(f, "ACTIVE"),
            NodeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Role of a node in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRole {
    /// Node is the coordinator
    Leader,
    /// Node follows the coordinator
    Follower,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Leader => write!(f, "LEADER"),
            NodeRole::Follower => write!(f, "FOLLOWER"),
        }
    }
}

/// State of a single node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Unique node identifier
    pub id: NodeId,
    /// Current status
    pub status: NodeStatus,
    /// Current role
    pub role: NodeRole,
    /// Node this one believes to be the leader
    pub coordinator_id: Option<NodeId>,
    /// Set while this node takes part in an election cascade
    pub election_in_progress: bool,
}

impl Node {
    /// Create an active follower
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            status: NodeStatus::Active,
            role: NodeRole::Follower,
            coordinator_id: None,
            election_in_progress: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }

    pub fn is_leader(&self) -> bool {
        self.role == NodeRole::Leader
    }
}

/// Externally visible view of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub status: NodeStatus,
    pub role: NodeRole,
    pub coordinator_id: Option<NodeId>,
}

impl From<&Node> for NodeSnapshot {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            status: node.status,
            role: node.role,
            coordinator_id: node.coordinator_id,
        }
    }
}

/// Authoritative node table for one cluster
///
/// Ids are fixed at creation; nodes only move between `Active` and
/// `Failed` and have their role and coordinator rewritten. The store
/// never emits events.
#[derive(Debug, Clone)]
pub struct NodeStore {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeStore {
    /// Build the node table, rejecting the whole configuration on any error
    pub fn create(
        ids: &[NodeId],
        initial_leader_id: NodeId,
        min_size: usize,
        max_size: usize,
    ) -> Result<Self> {
        let size = ids.len();
        if size < min_size || size > max_size {
            return Err(Error::ClusterSize { size, min: min_size, max: max_size });
        }

        let mut nodes = BTreeMap::new();
        for &id in ids {
            let mut node = Node::new(id);
            node.coordinator_id = Some(initial_leader_id);
            if nodes.insert(id, node).is_some() {
                return Err(Error::DuplicateNodeId(id));
            }
        }

        match nodes.get_mut(&initial_leader_id) {
            Some(leader) => leader.role = NodeRole::Leader,
            None => return Err(Error::UnknownInitialLeader(initial_leader_id)),
        }

        Ok(Self { nodes })
    }

    /// Get a node's state
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(Error::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))
    }

    /// All nodes in ascending id order
    pub fn all(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    /// Ids of active nodes in ascending order
    pub fn active_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.is_active())
            .map(|n| n.id)
            .collect()
    }

    pub fn set_status(&mut self, id: NodeId, status: NodeStatus) -> Result<()> {
        self.get_mut(id)?.status = status;
        Ok(())
    }

    pub fn set_role(&mut self, id: NodeId, role: NodeRole) -> Result<()> {
        self.get_mut(id)?.role = role;
        Ok(())
    }

    pub fn set_coordinator(&mut self, id: NodeId, coordinator_id: Option<NodeId>) -> Result<()> {
        self.get_mut(id)?.coordinator_id = coordinator_id;
        Ok(())
    }

    pub fn set_election_in_progress(&mut self, id: NodeId, in_progress: bool) -> Result<()> {
        self.get_mut(id)?.election_in_progress = in_progress;
        Ok(())
    }

    /// Get the node holding the leader role (if any)
    pub fn leader(&self) -> Option<NodeId> {
        self.nodes.values().find(|n| n.is_leader()).map(|n| n.id)
    }

    /// Get the leader only if it is still active
    pub fn active_leader(&self) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.is_leader() && n.is_active())
            .map(|n| n.id)
    }

    /// Get the cluster size (total nodes)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ordered view of every node
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.nodes.values().map(NodeSnapshot::from).collect()
    }

    /// Get cluster summary
    pub fn summary(&self) -> ClusterSummary {
        let active_nodes = self.nodes.values().filter(|n| n.is_active()).count();
        ClusterSummary {
            total_nodes: self.nodes.len(),
            active_nodes,
            failed_nodes: self.nodes.len() - active_nodes,
            leader_id: self.active_leader(),
        }
    }
}

/// Cluster summary information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub total_nodes: usize,
    pub active_nodes: usize,
    pub failed_nodes: usize,
    pub leader_id: Option<NodeId>,
}
