//! Commands sent from the host to a session instance.

use serde::{Deserialize, Serialize};

use crate::types::{AudioOptions, OverlayEntry, Point, VideoOptions};

/// Commands that the host can send to a session instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Build the configuration and create the engine session.
    Initiate,

    /// Tear the session down and release every device and overlay.
    Deinitiate,

    /// Query whether a session exists.
    IsInitialized,

    /// Query the engine's readiness signal.
    IsReady,

    /// Start transmitting to the given ingest endpoint.
    Start { url: String, stream_key: String },

    /// Stop transmitting.
    Stop,

    /// Set the continuous zoom ratio.
    SetZoom(f64),

    /// Mute or unmute the microphone.
    SetIsMuted(bool),

    /// Set the engine log level on the live session (or stage it).
    SetSessionLogLevel(String),

    /// Set the configuration-level log level before initiation.
    SetLogLevel(String),

    /// Select a named configuration preset.
    SetConfigurationPreset(String),

    /// Override video configuration fields.
    SetVideoConfig(VideoOptions),

    /// Override audio configuration fields.
    SetAudioConfig(AudioOptions),

    /// Replace the overlay slot set.
    SetOverlayConfig(Vec<OverlayEntry>),

    /// Set the camera preview aspect mode (`fit`, `fill`, `none`).
    SetCameraPreviewAspectMode(String),

    /// Mirror the camera preview.
    SetIsCameraPreviewMirrored(bool),

    /// Focus the attached camera at a point.
    Focus(Point),

    /// Stop the control loop.
    Shutdown,
}
