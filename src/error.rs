//! Bully Simulator Error Types

use thiserror::Error;

use crate::state::NodeId;

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Simulator error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Cluster size {size} outside allowed range {min}..={max}")]
    ClusterSize { size: usize, min: usize, max: usize },

    #[error("Initial leader {0} is not a member of the cluster")]
    UnknownInitialLeader(NodeId),

    // Runtime errors
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("No eligible node to fail")]
    NoEligibleNode,

    #[error("No leader available")]
    NoLeader,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error was raised while building a cluster
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ConfigParse(_)
                | Error::DuplicateNodeId(_)
                | Error::ClusterSize { .. }
                | Error::UnknownInitialLeader(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_classification() {
        assert!(Error::DuplicateNodeId(1).is_config_error());
        assert!(Error::ClusterSize { size: 2, min: 3, max: 10 }.is_config_error());
        assert!(Error::UnknownInitialLeader(9).is_config_error());
        assert!(!Error::NodeNotFound(4).is_config_error());
        assert!(!Error::NoLeader.is_config_error());
        assert!(!Error::InvalidCommand("invalid node id 'x'".into()).is_config_error());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::ClusterSize { size: 2, min: 3, max: 10 };
        assert_eq!(err.to_string(), "Cluster size 2 outside allowed range 3..=10");
        assert_eq!(Error::NodeNotFound(7).to_string(), "Node not found: 7");
    }
}
