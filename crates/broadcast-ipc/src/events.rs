//! Events sent from the session core to the host.

use serde::{Deserialize, Serialize};

use crate::state::SessionState;
use crate::types::{AudioStats, TransmissionStats};

/// Metadata attached to a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMetadata {
    /// Engine-assigned identifier of the broadcast session.
    pub session_id: String,
}

/// Normalized engine error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Engine error code.
    pub code: i64,

    /// Error domain or category.
    #[serde(rename = "type")]
    pub domain: String,

    /// Human readable message.
    pub detail: String,

    /// Description of the component that raised the error.
    pub source: Option<String>,

    /// Whether the session can no longer continue.
    pub is_fatal: bool,

    /// Session the error belongs to.
    pub session_id: String,
}

/// Events that the session core sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BroadcastEvent {
    /// Session state changed.
    StateChanged {
        state: SessionState,

        /// Present only when the new state is `Connected`.
        metadata: Option<StateMetadata>,
    },

    /// Engine error.
    Error(ErrorPayload),

    /// Audio level statistics.
    AudioStats(AudioStats),

    /// Unified transmission statistics.
    TransmissionStatisticsChanged(TransmissionStats),

    /// Broadcast quality score. Superseded by `TransmissionStatisticsChanged`
    /// but still delivered alongside it.
    QualityChanged { quality: f64 },

    /// Network health score. Superseded by `TransmissionStatisticsChanged`
    /// but still delivered alongside it.
    NetworkHealthChanged { network_health: f64 },
}

impl BroadcastEvent {
    /// Returns the registration slot this event is delivered to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StateChanged { .. } => EventKind::StateChanged,
            Self::Error(_) => EventKind::Error,
            Self::AudioStats(_) => EventKind::AudioStats,
            Self::TransmissionStatisticsChanged(_) => EventKind::TransmissionStatisticsChanged,
            Self::QualityChanged { .. } => EventKind::QualityChanged,
            Self::NetworkHealthChanged { .. } => EventKind::NetworkHealthChanged,
        }
    }
}

/// Event registrations the host can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    StateChanged,
    Error,
    AudioStats,
    TransmissionStatisticsChanged,
    QualityChanged,
    NetworkHealthChanged,
}

impl EventKind {
    /// Every registration, deprecated ones included.
    pub const ALL: [EventKind; 6] = [
        Self::StateChanged,
        Self::Error,
        Self::AudioStats,
        Self::TransmissionStatisticsChanged,
        Self::QualityChanged,
        Self::NetworkHealthChanged,
    ];

    /// Host-facing event name.
    pub fn name(self) -> &'static str {
        match self {
            Self::StateChanged => "onStateChanged",
            Self::Error => "onError",
            Self::AudioStats => "onAudioStats",
            Self::TransmissionStatisticsChanged => "onTransmissionStatisticsChanged",
            Self::QualityChanged => "onQualityChanged",
            Self::NetworkHealthChanged => "onNetworkHealthChanged",
        }
    }
}
