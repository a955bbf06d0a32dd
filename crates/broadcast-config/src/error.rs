//! Error types for the configuration module.

use thiserror::Error;

/// Errors that can occur while building a session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A named selector received a value it does not know.
    #[error("Unsupported {selector}: {value}")]
    UnknownValue {
        selector: &'static str,
        value: String,
    },

    /// Only one of `width` and `height` was provided.
    #[error("The `width` and `height` are interrelated and can not be used separately")]
    IncompleteSize,

    /// A numeric option is outside the range the engine accepts.
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Bitrate bounds are inconsistent.
    #[error("Bitrates must satisfy min ({min}) <= initial ({initial}) <= max ({max})")]
    BitrateOrder { min: u32, initial: u32, max: u32 },

    /// The process-wide audio session strategy is pinned by live sessions.
    #[error("Audio session strategy is {current} while {leases} session(s) are live; refusing to switch to {requested}")]
    AudioSessionLocked {
        current: &'static str,
        requested: &'static str,
        leases: usize,
    },
}
