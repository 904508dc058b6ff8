//! Lifecycle notifications and the notification bus.
//!
//! Publishing is synchronous and ordered: every subscriber registered at
//! publish time runs, in registration order, before `publish` returns.
//! That ordering is load-bearing for the `PlayerMoved` contract, which
//! lets subscribers observe pre-move state before the engine applies the
//! change.

use std::sync::{Arc, Mutex};

use crate::player::DestroyReason;

// ============================================================================
// Events
// ============================================================================

/// A lifecycle notification published by the engine.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A node connected during bootstrap.
    NodeConnected { node: String },
    /// A node-scoped failure was recovered locally.
    NodeError { node: String, message: String },

    /// A player was constructed and registered.
    PlayerCreated { guild_id: String },
    /// A player's believed channel is about to change. Published before
    /// the player state is updated; `old_channel` is `None` for a player
    /// that was channel-less.
    PlayerMoved {
        guild_id: String,
        old_channel: Option<String>,
        new_channel: String,
    },
    /// The gateway reported the player left its channel.
    PlayerDisconnected {
        guild_id: String,
        channel_id: Option<String>,
    },
    /// A player was destroyed. Published at most once per player.
    PlayerDestroyed {
        guild_id: String,
        reason: DestroyReason,
    },

    // Pass-through playback lifecycle, sourced from nodes.
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

/// Discriminant of a [`ManagerEvent`], used for filtered subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeConnected,
    NodeError,
    PlayerCreated,
    PlayerMoved,
    PlayerDisconnected,
    PlayerDestroyed,
    TrackStart,
    TrackEnd,
    TrackStuck,
    TrackError,
    QueueEnd,
    SocketClosed,
}

impl ManagerEvent {
    /// The event's discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            ManagerEvent::NodeConnected { .. } => EventKind::NodeConnected,
            ManagerEvent::NodeError { .. } => EventKind::NodeError,
            ManagerEvent::PlayerCreated { .. } => EventKind::PlayerCreated,
            ManagerEvent::PlayerMoved { .. } => EventKind::PlayerMoved,
            ManagerEvent::PlayerDisconnected { .. } => EventKind::PlayerDisconnected,
            ManagerEvent::PlayerDestroyed { .. } => EventKind::PlayerDestroyed,
            ManagerEvent::TrackStart { .. } => EventKind::TrackStart,
            ManagerEvent::TrackEnd { .. } => EventKind::TrackEnd,
            ManagerEvent::TrackStuck { .. } => EventKind::TrackStuck,
            ManagerEvent::TrackError { .. } => EventKind::TrackError,
            ManagerEvent::QueueEnd { .. } => EventKind::QueueEnd,
            ManagerEvent::SocketClosed { .. } => EventKind::SocketClosed,
        }
    }
}

// ============================================================================
// Notification Bus
// ============================================================================

type Callback = Box<dyn Fn(&ManagerEvent) + Send + Sync>;

struct Subscriber {
    filter: Option<EventKind>,
    callback: Callback,
}

/// Ordered, synchronous, multi-subscriber event emission.
///
/// Cheap to clone; clones share the subscriber list.
#[derive(Clone, Default)]
pub struct NotificationBus {
    subscribers: Arc<Mutex<Vec<Arc<Subscriber>>>>,
}

impl NotificationBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to all events.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&ManagerEvent) + Send + Sync + 'static,
    {
        self.push(None, Box::new(callback));
    }

    /// Subscribe to a single event kind.
    pub fn subscribe_to<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&ManagerEvent) + Send + Sync + 'static,
    {
        self.push(Some(kind), Box::new(callback));
    }

    fn push(&self, filter: Option<EventKind>, callback: Callback) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.push(Arc::new(Subscriber { filter, callback }));
    }

    /// Deliver an event to every matching subscriber, in registration
    /// order, before returning.
    pub fn publish(&self, event: &ManagerEvent) {
        // Snapshot the list so callbacks may subscribe without deadlocking;
        // late registrations do not see this event.
        let subscribers: Vec<Arc<Subscriber>> = {
            let guard = self
                .subscribers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.clone()
        };

        let kind = event.kind();
        for subscriber in subscribers {
            if subscriber.filter.map_or(true, |f| f == kind) {
                (subscriber.callback)(event);
            }
        }
    }
}
