//! Error types for the session core.

use thiserror::Error;

use broadcast_config::ConfigError;
use broadcast_media::EngineError;

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// An option value was rejected while building the configuration.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// `initiate` was called while a session exists.
    #[error("Session is already initialized")]
    AlreadyInitialized,

    /// The operation needs a live session.
    #[error("Session is not initialized")]
    NotInitialized,

    /// No device of the requested kind can be attached.
    #[error("No {0} available")]
    NoDeviceAvailable(String),

    /// An attach, exchange or detach completed with an error.
    #[error("Device operation failed: {0}")]
    DeviceOperation(EngineError),

    /// The ingest URL or stream key was rejected.
    #[error("Invalid ingest URL: {0}")]
    InvalidUrl(String),

    /// The engine refused to start transmitting.
    #[error("Failed to start broadcast: {0}")]
    EngineStart(EngineError),

    /// The engine rejected a synchronous request.
    #[error("Engine error: {0}")]
    Engine(EngineError),

    /// The zoom ratio is not a positive finite number.
    #[error("Invalid zoom ratio: {0}")]
    InvalidZoom(f64),

    /// The session control thread could not be started.
    #[error("Failed to spawn session control thread: {0}")]
    ThreadSpawn(String),

    /// The session control loop is no longer running.
    #[error("Session control loop has shut down")]
    ControlLoopClosed,
}
