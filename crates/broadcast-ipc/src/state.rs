//! Broadcast session state as reported by the engine.

use serde::{Deserialize, Serialize};

/// The state of a broadcast session.
///
/// States are produced by the broadcast engine; the session core only
/// relays them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// No session exists.
    #[default]
    Uninitialized,

    /// The engine is setting the session up.
    Initializing,

    /// The session is ready to start transmitting.
    Ready,

    /// Connecting to the ingest server.
    Connecting,

    /// Connected and transmitting.
    Connected,

    /// Transmission ended or the connection was lost.
    Disconnected,

    /// The session hit an error.
    Error,
}

impl SessionState {
    /// Returns true while the session is connecting or connected.
    pub fn is_transmitting(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Returns true if the session is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if the session is in the error state.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Initializing => "Initializing",
            Self::Ready => "Ready",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Error => "Error",
        }
    }
}
