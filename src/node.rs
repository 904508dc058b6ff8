//! Contracts for the external audio-node collaborators.
//!
//! A node is an external process that performs the actual audio retrieval
//! and decoding. This crate never owns a node's transport; it only issues
//! commands through the [`Node`] trait and consumes connectivity state.
//! Selection policy lives behind [`NodePool`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::DestroyReason;

// ============================================================================
// Errors
// ============================================================================

/// Errors produced by node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node could not be reached over the network.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// The node rejected the request.
    #[error("node rejected request: {0}")]
    Rejected(String),

    /// The node's own connection session is not established yet.
    #[error("node session not established")]
    SessionNotReady,
}

// ============================================================================
// Payloads
// ============================================================================

/// Voice credential update forwarded to a node.
///
/// Mirrors what the node needs to attach to the guild's voice server: the
/// gateway-issued token and endpoint plus the voice session id the player
/// currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceUpdate {
    pub token: String,
    pub endpoint: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

// ============================================================================
// Node
// ============================================================================

/// A single external audio-processing node.
///
/// All playback-affecting operations are asynchronous and may fail; the
/// engine treats a failure as a rejected operation, never as a crash of
/// the reconciliation loop.
#[async_trait]
pub trait Node: Send + Sync {
    /// Stable node name, used for logging and player assignment.
    fn name(&self) -> &str;

    /// Whether the node's transport is currently up.
    fn connected(&self) -> bool;

    /// The node's own connection-session identifier, available once the
    /// node has completed its handshake.
    fn session_id(&self) -> Option<String>;

    /// Establish the node's transport.
    async fn connect(&self) -> Result<(), NodeError>;

    /// Forward fresh voice credentials for a guild's player.
    ///
    /// Fails with [`NodeError::SessionNotReady`] if called before the node
    /// handshake completed.
    async fn update_player(&self, guild_id: &str, update: &VoiceUpdate) -> Result<(), NodeError>;

    /// Ask the node to join a voice channel for a guild.
    async fn connect_player(&self, guild_id: &str, channel_id: &str) -> Result<(), NodeError>;

    /// Pause playback for a guild.
    async fn pause_player(&self, guild_id: &str) -> Result<(), NodeError>;

    /// Resume playback for a guild.
    async fn resume_player(&self, guild_id: &str) -> Result<(), NodeError>;

    /// Tear down the node-side player for a guild.
    async fn destroy_player(&self, guild_id: &str, reason: DestroyReason) -> Result<(), NodeError>;
}

// ============================================================================
// Node Pool
// ============================================================================

/// The pool of known nodes.
///
/// The engine depends on the pool only for bootstrap connects and node
/// selection; health tracking and selection policy are the pool's own
/// concern.
pub trait NodePool: Send + Sync {
    /// All known nodes, in a stable order.
    fn nodes(&self) -> Vec<Arc<dyn Node>>;

    /// The preferred node for a new player, if any is usable.
    fn ideal(&self) -> Option<Arc<dyn Node>>;

    /// Whether any node is currently usable.
    fn any_connected(&self) -> bool {
        self.nodes().iter().any(|n| n.connected())
    }
}

// ============================================================================
// Node Events
// ============================================================================

/// Playback lifecycle events sourced from a node.
///
/// The engine passes these through to the notification bus unchanged; it
/// never mutates player state in response to them.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    TrackStart {
        guild_id: String,
        track: String,
    },
    TrackEnd {
        guild_id: String,
        track: String,
        reason: String,
    },
    TrackStuck {
        guild_id: String,
        track: String,
        threshold_ms: u64,
    },
    TrackError {
        guild_id: String,
        track: String,
        message: String,
    },
    QueueEnd {
        guild_id: String,
    },
    SocketClosed {
        guild_id: String,
        code: u16,
        reason: String,
        by_remote: bool,
    },
}
