//! Host bridge for broadcast sessions.
//!
//! The host addresses sessions by the id of the view node that owns them.
//! Commands are routed to the node's [`SessionHandle`]; events from every
//! node are fanned into one bounded channel that the host drains with
//! [`HostBridge::poll_events`].

pub mod commands;
mod error;

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use broadcast_core::SessionHandle;
use broadcast_ipc::{event_channel, BroadcastEvent, EventKind, Point, StartOptions};

pub use error::HostError;

/// Result type for host bridge operations.
pub type HostResult<T> = Result<T, HostError>;

/// Identifier of the host view node that owns a session.
pub type NodeId = u64;

/// An event tagged with the node whose session produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEvent {
    pub node: NodeId,
    pub event: BroadcastEvent,
}

/// Initialize logging.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "broadcast_host=debug,broadcast_core=debug,broadcast_media=info,broadcast_config=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Routes host commands to per-node sessions and collects their events.
pub struct HostBridge {
    nodes: RwLock<HashMap<NodeId, SessionHandle>>,
    event_tx: Sender<NodeEvent>,
    event_rx: Mutex<Receiver<NodeEvent>>,
}

impl Default for HostBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBridge {
    pub fn new() -> Self {
        let (event_tx, event_rx) = event_channel();
        Self {
            nodes: RwLock::new(HashMap::new()),
            event_tx,
            event_rx: Mutex::new(event_rx),
        }
    }

    /// Register the session owned by a node and subscribe to all of its
    /// events. Replaces any session previously registered for the node.
    pub fn register(&self, node: NodeId, session: SessionHandle) {
        for kind in EventKind::ALL {
            let event_tx = self.event_tx.clone();
            session.on(kind, move |event| forward(&event_tx, node, event));
        }

        if self.nodes.write().insert(node, session).is_some() {
            warn!(node, "Replaced the session registered for node");
        } else {
            info!(node, "Node registered");
        }
    }

    /// Remove a node and return its session. The caller decides whether to
    /// shut the session down.
    pub fn unregister(&self, node: NodeId) -> HostResult<SessionHandle> {
        let session = self
            .nodes
            .write()
            .remove(&node)
            .ok_or(HostError::UnknownNode(node))?;
        info!(node, "Node unregistered");
        Ok(session)
    }

    /// The session registered for a node.
    pub fn session(&self, node: NodeId) -> HostResult<SessionHandle> {
        self.nodes
            .read()
            .get(&node)
            .cloned()
            .ok_or(HostError::UnknownNode(node))
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.nodes.read().keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    #[instrument(name = "host_start", skip(self, options))]
    pub fn start(&self, node: NodeId, options: &StartOptions) -> HostResult<()> {
        let session = self.session(node)?;
        session.start(&options.rtmps_url, &options.stream_key)?;
        Ok(())
    }

    #[instrument(name = "host_stop", skip(self))]
    pub fn stop(&self, node: NodeId) -> HostResult<()> {
        self.session(node)?.stop()?;
        Ok(())
    }

    #[instrument(name = "host_focus", skip(self))]
    pub fn focus(&self, node: NodeId, point: Point) -> HostResult<()> {
        self.session(node)?.focus(point)?;
        Ok(())
    }

    /// Drain every event collected so far without blocking.
    pub fn poll_events(&self) -> Vec<NodeEvent> {
        let rx = self.event_rx.lock();
        let mut events = Vec::new();

        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        events
    }
}

fn forward(event_tx: &Sender<NodeEvent>, node: NodeId, event: BroadcastEvent) {
    match event_tx.try_send(NodeEvent { node, event }) {
        Ok(()) => {}
        Err(TrySendError::Full(dropped)) => {
            warn!(
                node,
                event = dropped.event.kind().name(),
                "Host event channel full, dropping event"
            );
        }
        Err(TrySendError::Disconnected(_)) => {
            debug!(node, "Host bridge gone, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use broadcast_config::AudioSessionRegistry;
    use broadcast_core::{spawn_session_with, SessionError};
    use broadcast_ipc::{SessionState, StateMetadata, EVENT_CHANNEL_CAPACITY};
    use broadcast_media::fake::FakeEngine;
    use broadcast_media::DefaultImageLoader;

    use super::*;

    fn spawn(engine: &FakeEngine) -> SessionHandle {
        spawn_session_with(
            Arc::new(engine.clone()),
            Arc::new(DefaultImageLoader::new()),
            Arc::new(AudioSessionRegistry::new()),
        )
        .unwrap()
    }

    fn settle(engine: &FakeEngine, session: &SessionHandle) {
        loop {
            // A round trip through the control loop handles every posted
            // completion.
            session.is_initialized().unwrap();
            if engine.complete_all() == 0 {
                break;
            }
        }
    }

    fn start_options() -> StartOptions {
        StartOptions {
            rtmps_url: "rtmps://ingest.example.com:443/app/".to_string(),
            stream_key: "key".to_string(),
        }
    }

    #[test]
    fn test_unknown_node() {
        let bridge = HostBridge::new();

        assert!(matches!(
            bridge.start(7, &start_options()),
            Err(HostError::UnknownNode(7))
        ));
        assert!(matches!(bridge.stop(7), Err(HostError::UnknownNode(7))));
        assert!(matches!(
            bridge.focus(7, Point { x: 0.5, y: 0.5 }),
            Err(HostError::UnknownNode(7))
        ));
        assert!(matches!(bridge.unregister(7), Err(HostError::UnknownNode(7))));
    }

    #[test]
    fn test_commands_reach_registered_session() {
        let engine = FakeEngine::with_default_devices();
        let session = spawn(&engine);
        let bridge = HostBridge::new();
        bridge.register(3, session.clone());

        assert!(matches!(
            bridge.start(3, &start_options()),
            Err(HostError::Session(SessionError::NotInitialized))
        ));

        session.initiate().unwrap();
        settle(&engine, &session);

        bridge.start(3, &start_options()).unwrap();
        bridge.focus(3, Point { x: 0.2, y: 0.8 }).unwrap();
        bridge.stop(3).unwrap();

        session.shutdown().unwrap();
    }

    #[test]
    fn test_events_fan_in_with_node_ids() {
        let first_engine = FakeEngine::with_default_devices();
        let second_engine = FakeEngine::with_default_devices();
        let bridge = HostBridge::new();
        let first = spawn(&first_engine);
        let second = spawn(&second_engine);
        bridge.register(1, first.clone());
        bridge.register(2, second.clone());
        assert_eq!(bridge.nodes(), vec![1, 2]);

        first.initiate().unwrap();
        second.initiate().unwrap();
        first_engine.emit_network_health(0.9);
        second_engine.emit_state(SessionState::Connected);

        let events = bridge.poll_events();
        assert_eq!(
            events,
            vec![
                NodeEvent {
                    node: 1,
                    event: BroadcastEvent::NetworkHealthChanged {
                        network_health: 0.9
                    },
                },
                NodeEvent {
                    node: 2,
                    event: BroadcastEvent::StateChanged {
                        state: SessionState::Connected,
                        metadata: Some(StateMetadata {
                            session_id: "fake-session-1".to_string()
                        }),
                    },
                },
            ]
        );
        assert!(bridge.poll_events().is_empty());

        first.shutdown().unwrap();
        second.shutdown().unwrap();
    }

    #[test]
    fn test_full_event_channel_drops_newest() {
        let engine = FakeEngine::with_default_devices();
        let session = spawn(&engine);
        let bridge = HostBridge::new();
        bridge.register(1, session.clone());
        session.initiate().unwrap();

        for _ in 0..EVENT_CHANNEL_CAPACITY + 5 {
            engine.emit_broadcast_quality(0.5);
        }

        assert_eq!(bridge.poll_events().len(), EVENT_CHANNEL_CAPACITY);
        session.shutdown().unwrap();
    }

    #[test]
    fn test_unregister_returns_session() {
        let engine = FakeEngine::with_default_devices();
        let bridge = HostBridge::new();
        bridge.register(5, spawn(&engine));

        let session = bridge.unregister(5).unwrap();
        assert!(bridge.nodes().is_empty());
        assert!(matches!(bridge.stop(5), Err(HostError::UnknownNode(5))));
        session.shutdown().unwrap();
    }
}
