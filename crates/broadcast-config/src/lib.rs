//! Session configuration presets, validation and merging.
//!
//! This crate turns a named preset plus the host's video and audio
//! overrides into a validated [`SessionConfig`], and owns the process-wide
//! audio session strategy.

mod audio_session;
mod builder;
mod error;
mod preset;
mod selectors;
mod session;

pub use audio_session::{AudioSessionLease, AudioSessionRegistry};
pub use builder::ConfigurationBuilder;
pub use error::ConfigError;
pub use preset::ConfigurationPreset;
pub use selectors::{AspectMode, AudioQuality, AudioSessionStrategy, AutoBitrateProfile, LogLevel};
pub use session::{
    AudioConfig, InputKind, SessionConfig, SlotDescriptor, VideoConfig, CAMERA_SLOT_NAME,
    CAMERA_Z_INDEX, OVERLAY_Z_INDEX,
};

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
