//! Shared test doubles for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::events::{EventKind, ManagerEvent, NotificationBus};
use crate::node::{Node, NodeError, NodePool, VoiceUpdate};
use crate::player::DestroyReason;

/// A node operation observed by [`MockNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockCall {
    Connect,
    UpdatePlayer {
        guild_id: String,
        token: String,
        endpoint: Option<String>,
        session_id: Option<String>,
    },
    ConnectPlayer {
        guild_id: String,
        channel_id: String,
    },
    Pause {
        guild_id: String,
    },
    Resume {
        guild_id: String,
    },
    DestroyPlayer {
        guild_id: String,
        reason: DestroyReason,
    },
}

/// Recording node double with scriptable failures.
pub(crate) struct MockNode {
    name: String,
    connected: AtomicBool,
    session_id: Mutex<Option<String>>,
    calls: Mutex<Vec<MockCall>>,
    fail_connect: AtomicBool,
    fail_connect_player: AtomicBool,
}

impl MockNode {
    /// A node that is already connected with a ready session.
    pub fn online(name: &str) -> Arc<Self> {
        let node = Self::offline(name);
        node.connected.store(true, Ordering::SeqCst);
        *node.session_id.lock().unwrap() = Some(format!("{name}-session"));
        node
    }

    /// A node that is down and has no session.
    pub fn offline(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            connected: AtomicBool::new(false),
            session_id: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            fail_connect: AtomicBool::new(false),
            fail_connect_player: AtomicBool::new(false),
        })
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == MockCall::Connect)
            .count()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Node for MockNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.lock().unwrap().clone()
    }

    async fn connect(&self) -> Result<(), NodeError> {
        self.record(MockCall::Connect);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(NodeError::Unreachable("mock connect refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        *self.session_id.lock().unwrap() = Some(format!("{}-session", self.name));
        Ok(())
    }

    async fn update_player(&self, guild_id: &str, update: &VoiceUpdate) -> Result<(), NodeError> {
        self.record(MockCall::UpdatePlayer {
            guild_id: guild_id.to_string(),
            token: update.token.clone(),
            endpoint: update.endpoint.clone(),
            session_id: update.session_id.clone(),
        });
        Ok(())
    }

    async fn connect_player(&self, guild_id: &str, channel_id: &str) -> Result<(), NodeError> {
        self.record(MockCall::ConnectPlayer {
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
        });
        if self.fail_connect_player.load(Ordering::SeqCst) {
            return Err(NodeError::Unreachable("mock join refused".to_string()));
        }
        Ok(())
    }

    async fn pause_player(&self, guild_id: &str) -> Result<(), NodeError> {
        self.record(MockCall::Pause {
            guild_id: guild_id.to_string(),
        });
        Ok(())
    }

    async fn resume_player(&self, guild_id: &str) -> Result<(), NodeError> {
        self.record(MockCall::Resume {
            guild_id: guild_id.to_string(),
        });
        Ok(())
    }

    async fn destroy_player(&self, guild_id: &str, reason: DestroyReason) -> Result<(), NodeError> {
        self.record(MockCall::DestroyPlayer {
            guild_id: guild_id.to_string(),
            reason,
        });
        Ok(())
    }
}

/// Fixed-membership pool; `ideal` picks the first connected node.
pub(crate) struct MockPool {
    nodes: Vec<Arc<MockNode>>,
}

impl MockPool {
    pub fn new(nodes: Vec<Arc<MockNode>>) -> Self {
        Self { nodes }
    }
}

impl NodePool for MockPool {
    fn nodes(&self) -> Vec<Arc<dyn Node>> {
        self.nodes.iter().map(|n| n.clone() as Arc<dyn Node>).collect()
    }

    fn ideal(&self) -> Option<Arc<dyn Node>> {
        self.nodes
            .iter()
            .find(|n| Node::connected(n.as_ref()))
            .map(|n| n.clone() as Arc<dyn Node>)
    }
}

/// Bus subscriber that records everything it sees.
#[derive(Clone)]
pub(crate) struct EventRecorder {
    events: Arc<Mutex<Vec<ManagerEvent>>>,
}

impl EventRecorder {
    pub fn attach(bus: &NotificationBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        Self { events }
    }

    pub fn events(&self) -> Vec<ManagerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(ManagerEvent::kind).collect()
    }
}
