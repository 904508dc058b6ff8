//! Player registry: guild id to player, at most one live player per guild.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::events::NotificationBus;
use crate::node::NodePool;
use crate::player::Player;

/// Shared guild → player map. Entries are inserted only by
/// [`PlayerRegistry::create_player`] and removed by `delete_player` or by
/// a player destroying itself.
pub(crate) type PlayerMap = Arc<DashMap<String, Arc<Player>>>;

/// Options for creating a new player.
#[derive(Debug, Clone, Default)]
pub struct PlayerOptions {
    pub guild_id: String,
    /// Assign a specific node by name; falls back to pool selection.
    pub node: Option<String>,
    /// Initial volume; falls back to the configured default.
    pub volume: Option<u16>,
}

impl PlayerOptions {
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registry owning player creation, lookup, and removal.
///
/// Cheap to clone; clones share the map.
#[derive(Clone)]
pub struct PlayerRegistry {
    players: PlayerMap,
    pool: Arc<dyn NodePool>,
    bus: NotificationBus,
    config: Arc<ManagerConfig>,
}

impl PlayerRegistry {
    pub(crate) fn new(
        pool: Arc<dyn NodePool>,
        bus: NotificationBus,
        config: Arc<ManagerConfig>,
    ) -> Self {
        Self {
            players: Arc::new(DashMap::new()),
            pool,
            bus,
            config,
        }
    }

    /// Create a player for a guild, or return the existing one unchanged.
    ///
    /// Idempotent by guild: a second call performs no mutation and emits
    /// no event. A new player is announced via `PlayerCreated` after it is
    /// visible in the registry.
    pub fn create_player(&self, opts: PlayerOptions) -> Result<Arc<Player>, ManagerError> {
        if let Some(existing) = self.players.get(&opts.guild_id) {
            return Ok(existing.clone());
        }

        let node = self.select_node(opts.node.as_deref())?;
        let volume = opts.volume.unwrap_or(self.config.default_volume);

        let player = Player::new(
            opts.guild_id.clone(),
            node,
            self.bus.clone(),
            self.players.clone(),
            volume,
        );

        // Another caller may have raced us; keep whichever player landed
        // first and announce only a player we actually inserted.
        let (inserted, player) = match self.players.entry(opts.guild_id.clone()) {
            Entry::Occupied(entry) => (false, entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(player.clone());
                (true, player)
            }
        };

        if inserted {
            debug!(guild_id = %opts.guild_id, node = %player.node().name(), "Player created");
            player.announce_created();
        }
        Ok(player)
    }

    /// Look up a player. No side effects.
    pub fn get_player(&self, guild_id: &str) -> Option<Arc<Player>> {
        self.players.get(guild_id).map(|entry| entry.clone())
    }

    /// Remove a registry entry.
    ///
    /// Fails with [`ManagerError::PlayerStillConnected`] while the player
    /// occupies a voice channel; a live player must be stopped through
    /// `Player::destroy` so it cannot be orphaned mid-channel. Returns
    /// whether an entry existed.
    pub fn delete_player(&self, guild_id: &str) -> Result<bool, ManagerError> {
        if let Some(entry) = self.players.get(guild_id) {
            if let Some(channel_id) = entry.channel_id() {
                return Err(ManagerError::PlayerStillConnected {
                    guild_id: guild_id.to_string(),
                    channel_id,
                });
            }
        }
        Ok(self.players.remove(guild_id).is_some())
    }

    /// Number of registered players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn select_node(&self, name: Option<&str>) -> Result<Arc<dyn crate::node::Node>, ManagerError> {
        if let Some(name) = name {
            return self
                .pool
                .nodes()
                .into_iter()
                .find(|n| n.name() == name && n.connected())
                .ok_or(ManagerError::NoAvailableNodes);
        }
        self.pool.ideal().ok_or(ManagerError::NoAvailableNodes)
    }
}
