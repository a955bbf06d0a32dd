//! Error types for the host bridge.

use thiserror::Error;

use broadcast_core::SessionError;

use crate::NodeId;

/// Errors that can occur while routing a host command.
#[derive(Debug, Error)]
pub enum HostError {
    /// No session is registered for the node.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// The command arguments could not be decoded.
    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    /// The session rejected the command.
    #[error(transparent)]
    Session(#[from] SessionError),
}
