//! Per-guild player state machine.
//!
//! A player tracks what this process believes about one guild's voice
//! attachment and playback, and issues commands to the node it is assigned
//! to. It shares its node reference with the pool; it never owns the node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ManagerError;
use crate::events::{ManagerEvent, NotificationBus};
use crate::node::Node;
use crate::registry::PlayerMap;

// ============================================================================
// Destroy Reason
// ============================================================================

/// Why a player was destroyed.
///
/// Tagged onto every destructive transition so subscribers can tell a
/// voluntary stop apart from failure-driven teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyReason {
    /// The occupied voice channel was deleted upstream.
    ChannelDeleted,
    /// The gateway reported the player left its channel and config says to
    /// destroy on disconnect.
    Disconnected,
    /// A reconnect attempt to the last known channel failed.
    ReconnectFailed,
    /// An external caller asked for the player to stop.
    Requested,
}

// ============================================================================
// Voice State
// ============================================================================

/// Voice credentials the player currently holds.
#[derive(Debug, Clone, Default)]
pub struct VoiceCredentials {
    /// Voice session id from the latest membership event.
    pub session_id: Option<String>,
    /// Voice server token from the latest credential event.
    pub token: Option<String>,
    /// Voice server endpoint from the latest credential event.
    pub endpoint: Option<String>,
}

#[derive(Debug, Default)]
struct PlayerState {
    /// `Some` iff the player believes it occupies a voice channel.
    channel_id: Option<String>,
    voice: VoiceCredentials,
    paused: bool,
}

// ============================================================================
// Player
// ============================================================================

/// The per-guild playback and voice-attachment state machine.
///
/// Mutated by the reconciliation engine in response to gateway events and
/// by direct API calls. Destroyed only through [`Player::destroy`]; the
/// registry refuses to drop a player that still occupies a channel.
pub struct Player {
    guild_id: String,
    node: Arc<dyn Node>,
    bus: NotificationBus,
    /// Registry map, so destroy can unregister itself.
    players: PlayerMap,
    state: Mutex<PlayerState>,
    /// Set exactly once; guarantees a single `PlayerDestroyed` emission.
    destroyed: AtomicBool,
    volume: u16,
}

impl Player {
    pub(crate) fn new(
        guild_id: String,
        node: Arc<dyn Node>,
        bus: NotificationBus,
        players: PlayerMap,
        volume: u16,
    ) -> Arc<Self> {
        Arc::new(Self {
            guild_id,
            node,
            bus,
            players,
            state: Mutex::new(PlayerState::default()),
            destroyed: AtomicBool::new(false),
            volume,
        })
    }

    /// Publish `PlayerCreated`. Called by the registry after insertion so
    /// registration and announcement stay decoupled.
    pub(crate) fn announce_created(&self) {
        self.bus.publish(&ManagerEvent::PlayerCreated {
            guild_id: self.guild_id.clone(),
        });
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    /// The channel the player believes it occupies.
    pub fn channel_id(&self) -> Option<String> {
        self.state().channel_id.clone()
    }

    pub fn voice(&self) -> VoiceCredentials {
        self.state().voice.clone()
    }

    pub fn paused(&self) -> bool {
        self.state().paused
    }

    pub fn volume(&self) -> u16 {
        self.volume
    }

    /// The node this player is assigned to.
    pub fn node(&self) -> Arc<dyn Node> {
        self.node.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Join a voice channel through the assigned node.
    ///
    /// The believed channel is updated only after the node accepts the
    /// command; a failure leaves the player in its previous state.
    pub async fn connect(&self, channel_id: &str) -> Result<(), ManagerError> {
        self.node.connect_player(&self.guild_id, channel_id).await?;

        self.state().channel_id = Some(channel_id.to_string());
        debug!(guild_id = %self.guild_id, channel_id = %channel_id, "Player connected to channel");
        Ok(())
    }

    /// Pause playback on the node. No-op when already paused.
    pub async fn pause(&self) -> Result<(), ManagerError> {
        if self.paused() {
            return Ok(());
        }
        self.node.pause_player(&self.guild_id).await?;
        self.state().paused = true;
        Ok(())
    }

    /// Resume playback on the node. No-op when not paused.
    pub async fn resume(&self) -> Result<(), ManagerError> {
        if !self.paused() {
            return Ok(());
        }
        self.node.resume_player(&self.guild_id).await?;
        self.state().paused = false;
        Ok(())
    }

    /// Tear the player down and unregister it.
    ///
    /// Runs at most once; repeated calls are no-ops. A node-side teardown
    /// failure is logged but does not keep the player registered, so a
    /// destroy is never silently lost.
    pub async fn destroy(&self, reason: DestroyReason) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            debug!(guild_id = %self.guild_id, "Ignoring repeated destroy");
            return;
        }

        if let Err(e) = self.node.destroy_player(&self.guild_id, reason).await {
            warn!(
                guild_id = %self.guild_id,
                node = %self.node.name(),
                error = %e,
                "Node-side player teardown failed"
            );
        }

        {
            let mut state = self.state();
            state.channel_id = None;
            state.voice = VoiceCredentials::default();
            state.paused = false;
        }
        self.players.remove(&self.guild_id);

        self.bus.publish(&ManagerEvent::PlayerDestroyed {
            guild_id: self.guild_id.clone(),
            reason,
        });
        debug!(guild_id = %self.guild_id, reason = ?reason, "Player destroyed");
    }

    // ------------------------------------------------------------------------
    // Engine-internal transitions
    // ------------------------------------------------------------------------

    /// Record fresh voice server credentials. Does not touch the believed
    /// channel.
    pub(crate) fn set_voice_server(&self, token: String, endpoint: Option<String>) {
        let mut state = self.state();
        state.voice.token = Some(token);
        state.voice.endpoint = endpoint;
    }

    /// Apply a membership event: refresh the voice session id and the
    /// believed channel.
    pub(crate) fn apply_membership(&self, session_id: String, channel_id: String) {
        let mut state = self.state();
        state.voice.session_id = Some(session_id);
        state.channel_id = Some(channel_id);
    }

    /// Detach from voice: the player stays registered but channel-less.
    /// Clearing the channel always clears the credentials with it.
    pub(crate) fn detach(&self) {
        let mut state = self.state();
        state.channel_id = None;
        state.voice = VoiceCredentials::default();
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Player")
            .field("guild_id", &self.guild_id)
            .field("node", &self.node.name())
            .field("channel_id", &state.channel_id)
            .field("paused", &state.paused)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
