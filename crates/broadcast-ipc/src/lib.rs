//! Typed host<->session messages for the broadcast session.
//!
//! This crate defines the message types exchanged between the host bridge
//! and the session orchestration core: the commands the host issues, the
//! normalized events the core emits, and the raw option mappings the host
//! supplies before they are validated.

mod commands;
mod events;
mod state;
mod types;

pub use commands::SessionCommand;
pub use events::{BroadcastEvent, ErrorPayload, EventKind, StateMetadata};
pub use state::SessionState;
pub use types::{
    AudioOptions, AudioStats, BroadcastQuality, NetworkHealth, OverlayEntry, Point, Size,
    StartOptions, TransmissionStats, VideoOptions,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (host → session).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (session → host).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel<T>() -> (Sender<T>, Receiver<T>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel<T>() -> (Sender<T>, Receiver<T>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
