//! Common types used across IPC messages.

use serde::{Deserialize, Serialize};

/// Options for starting a broadcast.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    /// RTMPS ingest URL (e.g., "rtmps://example.global-contribute.live-video.net:443/app/").
    pub rtmps_url: String,

    /// Stream key for authentication.
    pub stream_key: String,
}

/// Custom video options supplied by the host.
///
/// Only present keys override the preset. `width` and `height` must be
/// supplied together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VideoOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Initial bitrate in bits per second.
    pub bitrate: Option<u32>,
    pub target_frame_rate: Option<u32>,
    /// Keyframe interval in seconds.
    pub keyframe_interval: Option<u32>,
    #[serde(rename = "isBFrames")]
    pub is_b_frames: Option<bool>,
    pub is_auto_bitrate: Option<bool>,
    pub max_bitrate: Option<u32>,
    pub min_bitrate: Option<u32>,
    /// One of `conservative`, `fastIncrease`.
    pub auto_bitrate_profile: Option<String>,
}

/// Custom audio options supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AudioOptions {
    /// Bitrate in bits per second.
    pub bitrate: Option<u32>,
    pub channels: Option<u32>,
    /// One of `minimum`, `low`, `medium`, `high`, `maximum`.
    pub quality: Option<String>,
    /// One of `recordOnly`, `playAndRecord`, `playAndRecordDefaultToSpeaker`, `noAction`.
    ///
    /// This selector is process-wide, not per session.
    pub audio_session_strategy: Option<String>,
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// A position or point in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One overlay image slot requested by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayEntry {
    /// Unique slot name.
    pub name: String,

    /// Local path, `file://` or `http(s)://` URI of the image.
    pub uri: String,

    /// Slot size; defaults to the image's natural size.
    #[serde(default)]
    pub size: Option<Size>,

    /// Slot position; defaults to the origin.
    #[serde(default)]
    pub position: Option<Point>,
}

/// Network health as graded by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkHealth {
    Excellent,
    High,
    Medium,
    Low,
    Bad,
}

/// Broadcast quality as graded by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastQuality {
    NearMaximum,
    High,
    Medium,
    Low,
    NearMinimum,
}

/// Snapshot of transmission statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionStats {
    /// Round-trip time in milliseconds.
    pub rtt: f64,

    /// Measured outgoing bitrate in bits per second.
    pub measured_bitrate: f64,

    /// Bitrate the engine recommends in bits per second.
    pub recommended_bitrate: f64,

    pub network_health: NetworkHealth,

    pub broadcast_quality: BroadcastQuality,
}

/// Audio level statistics for the outgoing mix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioStats {
    pub peak: f64,
    pub rms: f64,
}
