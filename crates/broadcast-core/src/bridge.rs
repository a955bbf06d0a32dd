//! Engine callbacks to normalized host events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use broadcast_ipc::{AudioStats, BroadcastEvent, EventKind, SessionState, StateMetadata, TransmissionStats};
use broadcast_media::{EngineError, PreviewView, SessionDelegate};

/// Handler for one kind of event.
pub type EventHandler = Arc<dyn Fn(BroadcastEvent) + Send + Sync>;

/// Receives camera previews rendered by the engine.
pub type PreviewHandler = Arc<dyn Fn(PreviewView) + Send + Sync>;

/// Host event handlers, at most one per event kind.
///
/// Handlers run on whichever thread produced the event.
#[derive(Default)]
pub struct EventHandlers {
    handlers: RwLock<HashMap<EventKind, EventHandler>>,
    preview: RwLock<Option<PreviewHandler>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a kind, replacing any previous one.
    pub fn set<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(BroadcastEvent) + Send + Sync + 'static,
    {
        self.handlers.write().insert(kind, Arc::new(handler));
    }

    pub fn remove(&self, kind: EventKind) {
        self.handlers.write().remove(&kind);
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.handlers.read().contains_key(&kind)
    }

    pub fn set_preview_handler<F>(&self, handler: F)
    where
        F: Fn(PreviewView) + Send + Sync + 'static,
    {
        *self.preview.write() = Some(Arc::new(handler));
    }

    /// Deliver an event to its handler. Returns false if none is registered,
    /// in which case the event is dropped.
    pub fn dispatch(&self, event: BroadcastEvent) -> bool {
        // Clone out so a handler can re-register without deadlocking.
        let handler = self.handlers.read().get(&event.kind()).cloned();
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    pub(crate) fn present_preview(&self, view: PreviewView) -> bool {
        let handler = self.preview.read().clone();
        match handler {
            Some(handler) => {
                handler(view);
                true
            }
            None => false,
        }
    }
}

/// Translates one session's engine callbacks into [`BroadcastEvent`]s and
/// mirrors the reported session state.
///
/// Once detached, callbacks are ignored: the session they belong to has
/// been torn down.
pub struct EventBridge {
    handlers: Arc<EventHandlers>,
    state: Arc<RwLock<SessionState>>,
    attached: AtomicBool,
}

impl EventBridge {
    pub fn new(handlers: Arc<EventHandlers>, state: Arc<RwLock<SessionState>>) -> Self {
        Self {
            handlers,
            state,
            attached: AtomicBool::new(true),
        }
    }

    /// Stop relaying callbacks.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    fn emit(&self, event: BroadcastEvent) {
        if !self.is_attached() {
            debug!(event = event.kind().name(), "Dropping event from a torn-down session");
            return;
        }
        let kind = event.kind();
        if !self.handlers.dispatch(event) {
            debug!(event = kind.name(), "No handler registered, dropping event");
        }
    }
}

impl SessionDelegate for EventBridge {
    fn state_changed(&self, state: SessionState, session_id: &str) {
        if !self.is_attached() {
            debug!(
                state = state.name(),
                session_id,
                "Ignoring state change from a torn-down session"
            );
            return;
        }

        let previous = std::mem::replace(&mut *self.state.write(), state);
        debug!(
            previous = previous.name(),
            current = state.name(),
            "Session state changed"
        );

        let metadata = state.is_connected().then(|| StateMetadata {
            session_id: session_id.to_string(),
        });
        self.emit(BroadcastEvent::StateChanged { state, metadata });
    }

    fn error(&self, error: EngineError, session_id: &str) {
        self.emit(BroadcastEvent::Error(error.to_payload(session_id)));
    }

    fn transmission_statistics_changed(&self, statistics: TransmissionStats) {
        self.emit(BroadcastEvent::TransmissionStatisticsChanged(statistics));
    }

    fn network_health_changed(&self, health: f64) {
        self.emit(BroadcastEvent::NetworkHealthChanged {
            network_health: health,
        });
    }

    fn broadcast_quality_changed(&self, quality: f64) {
        self.emit(BroadcastEvent::QualityChanged { quality });
    }

    fn audio_stats_updated(&self, stats: AudioStats) {
        self.emit(BroadcastEvent::AudioStats(stats));
    }
}
