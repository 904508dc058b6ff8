//! voicelink — per-guild playback session coordination over externally
//! hosted audio nodes.
//!
//! Each guild gets at most one [`Player`], assigned to one node from the
//! pool. The [`PlayerManager`] reconciles player state against two
//! independent event sources: node connectivity and the gateway's voice
//! membership/credential stream. Lifecycle transitions are announced on
//! the [`NotificationBus`]; every destructive transition carries a
//! [`DestroyReason`] so subscribers can tell a requested stop from a
//! failure-driven teardown.
//!
//! Queue storage, node selection policy, wire framing, and track
//! resolution live behind the [`Node`] and [`NodePool`] contracts and are
//! out of this crate's scope.

mod config;
mod error;
mod events;
mod manager;
mod node;
mod player;
mod registry;
mod signal;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ClientIdentity, ManagerConfig};
pub use error::ManagerError;
pub use events::{EventKind, ManagerEvent, NotificationBus};
pub use manager::PlayerManager;
pub use node::{Node, NodeError, NodeEvent, NodePool, VoiceUpdate};
pub use player::{DestroyReason, Player, VoiceCredentials};
pub use registry::{PlayerOptions, PlayerRegistry};
pub use signal::{ChannelDelete, GatewaySignal, VoiceServerUpdate, VoiceStateUpdate};
