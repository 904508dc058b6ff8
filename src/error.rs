//! Engine error taxonomy.

use thiserror::Error;

use crate::node::NodeError;

/// Errors surfaced by the manager and registry.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The merged client identity is unusable for reconciliation.
    #[error("invalid client identity: {0}")]
    InvalidClientIdentity(String),

    /// Bootstrap connected zero of the attempted nodes.
    #[error("bootstrap failed: none of {attempted} node(s) connected")]
    BootstrapFailed { attempted: usize },

    /// The player still occupies a voice channel and must be destroyed
    /// before its registry entry can be removed.
    #[error("player for guild {guild_id} is still connected to channel {channel_id}")]
    PlayerStillConnected { guild_id: String, channel_id: String },

    /// The assigned node has no established session, so a playback command
    /// would desynchronize node and engine state. Retryable.
    #[error("node {node} has no established session yet")]
    NodeSessionNotReady { node: String },

    /// No connected node was available for player assignment.
    #[error("no available nodes")]
    NoAvailableNodes,

    /// A node operation failed.
    #[error(transparent)]
    Node(#[from] NodeError),
}
