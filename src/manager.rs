//! The session reconciliation engine.
//!
//! # Architecture
//!
//! ```text
//!  gateway signals ──▶ route_signal ─┐
//!                                    ├──▶ PlayerRegistry (guild → Player)
//!  node events ─────▶ handle_node_event                 │
//!                                    │                  ▼
//!                                    └──▶ NotificationBus ──▶ subscribers
//! ```
//!
//! The engine ingests two asynchronous, partially-correlated event
//! streams: connectivity from the node pool and voice membership or
//! credential updates from the signaling gateway. It reconciles each
//! guild's player against the latest known truth, issuing commands to the
//! player's assigned node and announcing every lifecycle transition on
//! the bus.
//!
//! Callers are expected to feed signals from a single task; events for
//! the same guild are reconciled in arrival order, and a destroy always
//! runs to completion before the guild's next event is processed. There
//! is no transaction log behind this: correctness rests on the ordering
//! and idempotence rules in this module.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{ClientIdentity, ManagerConfig};
use crate::error::ManagerError;
use crate::events::{ManagerEvent, NotificationBus};
use crate::node::{NodeEvent, NodePool, VoiceUpdate};
use crate::player::{DestroyReason, Player};
use crate::registry::{PlayerOptions, PlayerRegistry};
use crate::signal::{ChannelDelete, GatewaySignal, VoiceServerUpdate, VoiceStateUpdate};

// ============================================================================
// Disconnect Outcome
// ============================================================================

/// Result of the voice-disconnect transition. Exactly one branch runs per
/// membership event without a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DisconnectOutcome {
    /// The player was torn down, with the tagged reason.
    Destroyed(DestroyReason),
    /// The player rejoined its last known channel and resumed.
    Reconnected,
    /// The player stays registered but channel-less.
    Detached,
}

// ============================================================================
// Player Manager
// ============================================================================

/// Coordinates per-guild players across the node pool and the gateway.
///
/// One instance per engine; never a global. Multiple independent managers
/// may coexist in one process.
pub struct PlayerManager {
    config: Arc<ManagerConfig>,
    pool: Arc<dyn NodePool>,
    bus: NotificationBus,
    registry: PlayerRegistry,
    /// Local gateway identity, set by `init`.
    identity: RwLock<Option<ClientIdentity>>,
    /// True once at least one node connected during bootstrap.
    initiated: AtomicBool,
    /// Serializes concurrent `init` calls.
    init_lock: tokio::sync::Mutex<()>,
}

impl PlayerManager {
    /// Create a manager over a node pool.
    pub fn new(config: ManagerConfig, pool: Arc<dyn NodePool>) -> Self {
        let config = Arc::new(config);
        let bus = NotificationBus::new();
        let registry = PlayerRegistry::new(pool.clone(), bus.clone(), config.clone());

        Self {
            config,
            pool,
            bus,
            registry,
            identity: RwLock::new(None),
            initiated: AtomicBool::new(false),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The notification bus for lifecycle subscriptions.
    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Whether bootstrap completed with at least one connected node.
    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Whether any pool node is currently usable.
    pub fn any_node_usable(&self) -> bool {
        self.pool.any_connected()
    }

    /// The merged client identity, once `init` has run.
    pub fn identity(&self) -> Option<ClientIdentity> {
        self.identity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    // ------------------------------------------------------------------------
    // Registry surface
    // ------------------------------------------------------------------------

    /// The registry owning this manager's players.
    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    /// See [`PlayerRegistry::create_player`].
    pub fn create_player(&self, opts: PlayerOptions) -> Result<Arc<Player>, ManagerError> {
        self.registry.create_player(opts)
    }

    /// See [`PlayerRegistry::get_player`].
    pub fn get_player(&self, guild_id: &str) -> Option<Arc<Player>> {
        self.registry.get_player(guild_id)
    }

    /// See [`PlayerRegistry::delete_player`].
    pub fn delete_player(&self, guild_id: &str) -> Result<bool, ManagerError> {
        self.registry.delete_player(guild_id)
    }

    // ------------------------------------------------------------------------
    // Bootstrap
    // ------------------------------------------------------------------------

    /// Merge the client identity and connect the node pool.
    ///
    /// Idempotent: a second call while already initiated returns
    /// immediately. Node clusters are heterogeneous and a partial outage
    /// is expected, so each connect failure is recovered locally (logged
    /// and published as a `NodeError` notification) and the loop
    /// continues. Bootstrap fails only when zero nodes connected; state is
    /// left consistent so the call may be retried.
    pub async fn init(&self, identity: ClientIdentity) -> Result<(), ManagerError> {
        let _guard = self.init_lock.lock().await;

        if self.is_initiated() {
            debug!("Manager already initiated, skipping bootstrap");
            return Ok(());
        }

        let merged = identity.merged_over(self.config.client.as_ref());
        if merged.id.is_empty() {
            return Err(ManagerError::InvalidClientIdentity(
                "client id must be a non-empty string".to_string(),
            ));
        }
        {
            let mut slot = self
                .identity
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = Some(merged);
        }

        let nodes = self.pool.nodes();
        let attempted = nodes.len();
        let mut connected = 0_usize;

        for node in nodes {
            match node.connect().await {
                Ok(()) => {
                    connected += 1;
                    info!(node = %node.name(), "Node connected");
                    self.bus.publish(&ManagerEvent::NodeConnected {
                        node: node.name().to_string(),
                    });
                }
                Err(e) => {
                    warn!(node = %node.name(), error = %e, "Node connect failed during bootstrap");
                    self.bus.publish(&ManagerEvent::NodeError {
                        node: node.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if connected == 0 {
            return Err(ManagerError::BootstrapFailed { attempted });
        }

        self.initiated.store(true, Ordering::SeqCst);
        info!(connected, attempted, "Manager initiated");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Signal ingestion
    // ------------------------------------------------------------------------

    /// Ingest a raw gateway envelope.
    ///
    /// No-op before `init` completes (no player is ever mutated on a
    /// stale or incomplete identity) and for unrecognized envelopes. The
    /// one propagated failure is [`ManagerError::NodeSessionNotReady`]:
    /// the player stays registered and attached, so the signal is safely
    /// retryable once the node catches up.
    pub async fn route_signal(&self, raw: &Value) -> Result<(), ManagerError> {
        if !self.is_initiated() {
            debug!("Dropping gateway signal before bootstrap completed");
            return Ok(());
        }

        let Some(signal) = GatewaySignal::from_raw(raw) else {
            debug!("Ignoring unrecognized gateway signal");
            return Ok(());
        };

        match signal {
            GatewaySignal::ChannelDelete(channel) => self.on_channel_delete(channel).await,
            GatewaySignal::VoiceServerUpdate(server) => self.on_voice_server_update(server).await,
            GatewaySignal::VoiceStateUpdate(state) => self.on_voice_state_update(state).await,
        }
    }

    /// Pass a playback lifecycle event from a node through to the bus.
    pub fn handle_node_event(&self, event: NodeEvent) {
        let event = match event {
            NodeEvent::TrackStart { guild_id, track } => {
                ManagerEvent::TrackStart { guild_id, track }
            }
            NodeEvent::TrackEnd {
                guild_id,
                track,
                reason,
            } => ManagerEvent::TrackEnd {
                guild_id,
                track,
                reason,
            },
            NodeEvent::TrackStuck {
                guild_id,
                track,
                threshold_ms,
            } => ManagerEvent::TrackStuck {
                guild_id,
                track,
                threshold_ms,
            },
            NodeEvent::TrackError {
                guild_id,
                track,
                message,
            } => ManagerEvent::TrackError {
                guild_id,
                track,
                message,
            },
            NodeEvent::QueueEnd { guild_id } => ManagerEvent::QueueEnd { guild_id },
            NodeEvent::SocketClosed {
                guild_id,
                code,
                reason,
                by_remote,
            } => ManagerEvent::SocketClosed {
                guild_id,
                code,
                reason,
                by_remote,
            },
        };
        self.bus.publish(&event);
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// An upstream channel was deleted. Destroys the guild's player only
    /// when it actually occupies that channel; deletions of channels with
    /// no active player are expected and common.
    async fn on_channel_delete(&self, channel: ChannelDelete) -> Result<(), ManagerError> {
        let Some(guild_id) = channel.guild_id else {
            return Ok(());
        };
        let Some(player) = self.registry.get_player(&guild_id) else {
            debug!(guild_id = %guild_id, "Channel deleted for guild without player");
            return Ok(());
        };

        if player.channel_id().as_deref() == Some(channel.id.as_str()) {
            info!(guild_id = %guild_id, channel_id = %channel.id, "Occupied channel deleted, destroying player");
            player.destroy(DestroyReason::ChannelDeleted).await;
        }
        Ok(())
    }

    /// Fresh voice credentials for a guild. Forwarded to the assigned
    /// node together with the player's current voice session id; the
    /// believed channel is untouched.
    async fn on_voice_server_update(&self, server: VoiceServerUpdate) -> Result<(), ManagerError> {
        let Some(player) = self.registry.get_player(&server.guild_id) else {
            debug!(guild_id = %server.guild_id, "Voice credentials for guild without player");
            return Ok(());
        };

        let node = player.node();
        // Issuing a playback command without a valid node session would
        // desynchronize node and engine state, so this is fatal to the
        // call rather than silently swallowed.
        if node.session_id().is_none() {
            return Err(ManagerError::NodeSessionNotReady {
                node: node.name().to_string(),
            });
        }

        player.set_voice_server(server.token.clone(), server.endpoint.clone());

        let update = VoiceUpdate {
            token: server.token,
            endpoint: server.endpoint,
            session_id: player.voice().session_id,
        };
        node.update_player(&server.guild_id, &update).await?;

        debug!(guild_id = %server.guild_id, node = %node.name(), "Forwarded voice credentials");
        Ok(())
    }

    /// Voice-channel membership changed for one occupant.
    async fn on_voice_state_update(&self, state: VoiceStateUpdate) -> Result<(), ManagerError> {
        let Some(guild_id) = state.guild_id else {
            return Ok(());
        };
        let Some(player) = self.registry.get_player(&guild_id) else {
            debug!(guild_id = %guild_id, "Membership event for guild without player");
            return Ok(());
        };

        // Membership events about other occupants must not perturb state.
        let local_id = self.identity().map(|identity| identity.id);
        if local_id.as_deref() != Some(state.user_id.as_str()) {
            debug!(guild_id = %guild_id, user_id = %state.user_id, "Membership event for other occupant");
            return Ok(());
        }

        match state.channel_id {
            Some(new_channel) => {
                let old_channel = player.channel_id();
                if old_channel.as_deref() != Some(new_channel.as_str()) {
                    // Published before the change is applied so subscribers
                    // can observe the pre-move state.
                    self.bus.publish(&ManagerEvent::PlayerMoved {
                        guild_id: guild_id.clone(),
                        old_channel,
                        new_channel: new_channel.clone(),
                    });
                }
                player.apply_membership(state.session_id, new_channel);
                Ok(())
            }
            None => {
                let outcome = self.on_voice_disconnect(&player).await;
                debug!(guild_id = %guild_id, outcome = ?outcome, "Voice disconnect reconciled");
                Ok(())
            }
        }
    }

    /// The player left voice. The branches below are mutually exclusive
    /// and exhaustive; exactly one runs per event.
    async fn on_voice_disconnect(&self, player: &Arc<Player>) -> DisconnectOutcome {
        let guild_id = player.guild_id().to_string();

        if self.config.destroy_player_on_disconnect {
            player.destroy(DestroyReason::Disconnected).await;
            return DisconnectOutcome::Destroyed(DestroyReason::Disconnected);
        }

        let last_channel = player.channel_id();
        self.bus.publish(&ManagerEvent::PlayerDisconnected {
            guild_id: guild_id.clone(),
            channel_id: last_channel.clone(),
        });
        if let Err(e) = player.pause().await {
            warn!(guild_id = %guild_id, error = %e, "Pause after disconnect failed");
        }

        if self.config.auto_reconnect {
            let Some(channel) = last_channel else {
                // Nothing to reconnect to; fall through to detaching.
                player.detach();
                return DisconnectOutcome::Detached;
            };

            return match player.connect(&channel).await {
                Ok(()) => {
                    if let Err(e) = player.resume().await {
                        warn!(guild_id = %guild_id, error = %e, "Resume after reconnect failed");
                    }
                    info!(guild_id = %guild_id, channel_id = %channel, "Player reconnected");
                    DisconnectOutcome::Reconnected
                }
                Err(e) => {
                    // Never left half-connected: a failed reconnect always
                    // escalates to destruction.
                    warn!(guild_id = %guild_id, channel_id = %channel, error = %e, "Reconnect failed, destroying player");
                    player.destroy(DestroyReason::ReconnectFailed).await;
                    DisconnectOutcome::Destroyed(DestroyReason::ReconnectFailed)
                }
            };
        }

        player.detach();
        DisconnectOutcome::Detached
    }
}
