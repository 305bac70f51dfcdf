//! Event Types
//!
//! Defines the events pushed to subscribers, in the order they occur
//! within a synchronous cascade.

use serde::{Deserialize, Serialize};

use crate::state::NodeId;

/// Messages exchanged during a cascade step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Sent by a candidate to every higher active node
    Election,
    /// Answer from a higher node that takes over the election
    Ok,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Election => write!(f, "ELECTION"),
            MessageKind::Ok => write!(f, "OK"),
        }
    }
}

/// Protocol events delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionEvent {
    /// A node became a candidate
    Started {
        initiator: NodeId,
    },

    /// An ELECTION or OK message travelled between two nodes
    Message {
        message: MessageKind,
        from: NodeId,
        to: NodeId,
    },

    /// A node won the election
    Elected {
        leader: NodeId,
        previous: Option<NodeId>,
    },

    /// A node failed
    Failed {
        id: NodeId,
        was_leader: bool,
    },

    /// A failed node came back as a follower
    Recovered {
        id: NodeId,
    },

    /// The last active node failed
    Leaderless,

    /// An active node noticed the coordinator is gone and is about to start an election
    Detected {
        detector: NodeId,
        failed_leader: Option<NodeId>,
    },
}

/// Discriminant of an [`ElectionEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Started,
    Message,
    Elected,
    Failed,
    Recovered,
    Leaderless,
    Detected,
}

impl ElectionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ElectionEvent::Started { .. } => EventKind::Started,
            ElectionEvent::Message { .. } => EventKind::Message,
            ElectionEvent::Elected { .. } => EventKind::Elected,
            ElectionEvent::Failed { .. } => EventKind::Failed,
            ElectionEvent::Recovered { .. } => EventKind::Recovered,
            ElectionEvent::Leaderless => EventKind::Leaderless,
            ElectionEvent::Detected { .. } => EventKind::Detected,
        }
    }

    /// Shorthand for an ELECTION message event
    pub fn election(from: NodeId, to: NodeId) -> Self {
        ElectionEvent::Message { message: MessageKind::Election, from, to }
    }

    /// Shorthand for an OK message event
    pub fn ok(from: NodeId, to: NodeId) -> Self {
        ElectionEvent::Message { message: MessageKind::Ok, from, to }
    }
}

impl std::fmt::Display for ElectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionEvent::Started { initiator } => {
                write!(f, "P{} started an election", initiator)
            }
            ElectionEvent::Message { message, from, to } => {
                write!(f, "P{} -> {} -> P{}", from, message, to)
            }
            ElectionEvent::Elected { leader, .. } => {
                write!(f, "P{} was elected coordinator", leader)
            }
            ElectionEvent::Failed { id, was_leader: true } => {
                write!(f, "P{} (coordinator) failed", id)
            }
            ElectionEvent::Failed { id, was_leader: false } => write!(f, "P{} failed", id),
            ElectionEvent::Recovered { id } => write!(f, "P{} recovered", id),
            ElectionEvent::Leaderless => write!(f, "all nodes failed, no coordinator"),
            ElectionEvent::Detected { detector, failed_leader: Some(old) } => {
                write!(f, "P{} detected the failure of coordinator P{}", detector, old)
            }
            ElectionEvent::Detected { detector, failed_leader: None } => {
                write!(f, "P{} detected a missing coordinator", detector)
            }
        }
    }
}
