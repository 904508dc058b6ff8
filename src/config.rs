//! Manager configuration and client identity.

use std::time::Duration;

use serde::Deserialize;

// ============================================================================
// Client Identity
// ============================================================================

/// The local agent's identity on the signaling gateway.
///
/// Reconciliation needs the id to tell membership events about this agent
/// apart from events about other channel occupants.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientIdentity {
    /// Gateway user id. Must be non-empty by the time `init` completes.
    #[serde(default)]
    pub id: String,
    /// Display name, informational only.
    #[serde(default)]
    pub username: Option<String>,
}

impl ClientIdentity {
    /// Create an identity from an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
        }
    }

    /// Merge `self` over a pre-seeded base: empty fields fall back to the
    /// base's values.
    pub(crate) fn merged_over(mut self, base: Option<&ClientIdentity>) -> Self {
        if let Some(base) = base {
            if self.id.is_empty() {
                self.id = base.id.clone();
            }
            if self.username.is_none() {
                self.username = base.username.clone();
            }
        }
        self
    }
}

// ============================================================================
// Manager Config
// ============================================================================

/// Configuration for a [`PlayerManager`](crate::manager::PlayerManager).
///
/// Immutable after construction except for the client identity merge
/// performed by `init`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Reconnect a player to its last known channel after an unexpected
    /// disconnect.
    pub auto_reconnect: bool,

    /// Destroy a player outright when the gateway reports it left its
    /// channel. Takes precedence over `auto_reconnect`.
    pub destroy_player_on_disconnect: bool,

    /// Grace period before the queue collaborator tears down a player whose
    /// queue ran dry. Carried here for collaborators; not consumed by the
    /// reconciliation core.
    #[serde(with = "opt_duration_secs")]
    pub empty_queue_destroy_delay: Option<Duration>,

    /// Initial volume for new players, in percent.
    pub default_volume: u16,

    /// Search prefix handed to the resolver collaborator.
    pub default_search_platform: String,

    /// Pre-seeded identity fields, merged with the `init` argument.
    pub client: Option<ClientIdentity>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            destroy_player_on_disconnect: false,
            empty_queue_destroy_delay: None,
            default_volume: 100,
            default_search_platform: "ytsearch".to_string(),
            client: None,
        }
    }
}

// ============================================================================
// Private Helpers (Serde)
// ============================================================================

mod opt_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
