//! Shared fixtures for reconciliation tests: a recording node double, a
//! fixed pool, and a bus recorder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use voicelink::{
    DestroyReason, EventKind, ManagerEvent, Node, NodeError, NodePool, NotificationBus,
    VoiceUpdate,
};

/// A node operation observed by [`RecordingNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCall {
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

/// Node double that records every command and can be scripted to fail.
pub struct RecordingNode {
    name: String,
    connected: AtomicBool,
    session_id: Mutex<Option<String>>,
    calls: Mutex<Vec<NodeCall>>,
    fail_connect: AtomicBool,
    fail_connect_player: AtomicBool,
}

impl RecordingNode {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            connected: AtomicBool::new(false),
            session_id: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            fail_connect: AtomicBool::new(false),
            fail_connect_player: AtomicBool::new(false),
        })
    }

    pub fn set_session_id(&self, session_id: Option<&str>) {
        *self.session_id.lock().unwrap() = session_id.map(str::to_string);
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_connect_player(&self) {
        self.fail_connect_player.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls recorded after bootstrap, i.e. everything but `Connect`.
    pub fn player_calls(&self) -> Vec<NodeCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != NodeCall::Connect)
            .collect()
    }

    fn record(&self, call: NodeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Node for RecordingNode {
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
        self.record(NodeCall::Connect);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(NodeError::Unreachable("scripted failure".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        *self.session_id.lock().unwrap() = Some(format!("{}-session", self.name));
        Ok(())
    }

    async fn update_player(&self, guild_id: &str, update: &VoiceUpdate) -> Result<(), NodeError> {
        self.record(NodeCall::UpdatePlayer {
            guild_id: guild_id.to_string(),
            token: update.token.clone(),
            endpoint: update.endpoint.clone(),
            session_id: update.session_id.clone(),
        });
        Ok(())
    }

    async fn connect_player(&self, guild_id: &str, channel_id: &str) -> Result<(), NodeError> {
        self.record(NodeCall::ConnectPlayer {
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
        });
        if self.fail_connect_player.load(Ordering::SeqCst) {
            return Err(NodeError::Unreachable("scripted failure".to_string()));
        }
        Ok(())
    }

    async fn pause_player(&self, guild_id: &str) -> Result<(), NodeError> {
        self.record(NodeCall::Pause {
            guild_id: guild_id.to_string(),
        });
        Ok(())
    }

    async fn resume_player(&self, guild_id: &str) -> Result<(), NodeError> {
        self.record(NodeCall::Resume {
            guild_id: guild_id.to_string(),
        });
        Ok(())
    }

    async fn destroy_player(&self, guild_id: &str, reason: DestroyReason) -> Result<(), NodeError> {
        self.record(NodeCall::DestroyPlayer {
            guild_id: guild_id.to_string(),
            reason,
        });
        Ok(())
    }
}

/// Fixed-membership pool; `ideal` returns the first connected node.
pub struct FixedPool {
    nodes: Vec<Arc<RecordingNode>>,
}

impl FixedPool {
    pub fn new(nodes: Vec<Arc<RecordingNode>>) -> Self {
        Self { nodes }
    }
}

impl NodePool for FixedPool {
    fn nodes(&self) -> Vec<Arc<dyn Node>> {
        self.nodes
            .iter()
            .map(|n| n.clone() as Arc<dyn Node>)
            .collect()
    }

    fn ideal(&self) -> Option<Arc<dyn Node>> {
        self.nodes
            .iter()
            .find(|n| Node::connected(n.as_ref()))
            .map(|n| n.clone() as Arc<dyn Node>)
    }
}

/// Bus subscriber recording every event it sees.
#[derive(Clone)]
pub struct EventRecorder {
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

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}
