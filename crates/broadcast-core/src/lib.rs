//! Broadcast session orchestration.
//!
//! This crate owns the lifecycle of a single broadcast session: it builds
//! the configuration, creates the engine session, attaches the camera and
//! microphone, drives zoom-based camera selection, composites overlay
//! images and relays engine callbacks to the host as [`BroadcastEvent`]s.
//!
//! [`BroadcastEvent`]: broadcast_ipc::BroadcastEvent

mod bridge;
mod completion;
mod control;
mod devices;
mod error;
mod orchestrator;
mod slots;
mod staged;

pub use bridge::{EventBridge, EventHandler, EventHandlers, PreviewHandler};
pub use control::{spawn_session, spawn_session_with, SessionHandle, CONTROL_THREAD_NAME};
pub use devices::{gain_for, DeviceWaiter, ZoomTarget, MIN_ZOOM, ZOOM_RAMP_RATE};
pub use error::SessionError;
pub use orchestrator::{parse_ingest_url, DeviceCompletionReceiver, Orchestrator, INGEST_SCHEMES};
pub use slots::{resolve_overlays, ResolvedOverlay};
pub use staged::Staged;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
