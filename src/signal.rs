//! Gateway signal envelope and parsing.
//!
//! The upstream gateway delivers events as `{"t": TAG, "d": {...}}`
//! envelopes, globally interleaved but ordered per connection. Only the
//! three tags that matter for voice reconciliation are parsed; everything
//! else is treated as unrecognized and dropped by the caller.

use serde::Deserialize;
use serde_json::Value;

/// A parsed gateway signal relevant to voice reconciliation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum GatewaySignal {
    /// A channel was deleted upstream.
    #[serde(rename = "CHANNEL_DELETE")]
    ChannelDelete(ChannelDelete),

    /// Fresh voice credentials for a guild (token present).
    #[serde(rename = "VOICE_SERVER_UPDATE")]
    VoiceServerUpdate(VoiceServerUpdate),

    /// Voice-channel membership change for one occupant (session id
    /// present, no token).
    #[serde(rename = "VOICE_STATE_UPDATE")]
    VoiceStateUpdate(VoiceStateUpdate),
}

impl GatewaySignal {
    /// Parse a raw envelope. Returns `None` for unrecognized tags or
    /// malformed payloads; the engine treats both as no-ops.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        serde_json::from_value(raw.clone()).ok()
    }
}

/// Payload of a `CHANNEL_DELETE` signal.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDelete {
    /// The deleted channel.
    pub id: String,
    /// Owning guild; absent for channels outside any guild.
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// Payload of a `VOICE_SERVER_UPDATE` signal.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceServerUpdate {
    pub guild_id: String,
    pub token: String,
    /// May be absent while the voice server is being reallocated.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Payload of a `VOICE_STATE_UPDATE` signal.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceStateUpdate {
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The occupant this state describes.
    pub user_id: String,
    pub session_id: String,
    /// `None` means the occupant left voice entirely.
    #[serde(default)]
    pub channel_id: Option<String>,
}
