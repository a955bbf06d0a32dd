//! The broadcast engine contract.
//!
//! The engine performs capture, encoding, mixing and transport. The session
//! core drives it through these traits and never re-implements any of that.
//! Asynchronous engine operations report back through one-shot completion
//! callbacks that the engine may invoke from any of its own threads.

use std::sync::Arc;

use url::Url;

use broadcast_config::{AspectMode, AudioSessionStrategy, LogLevel, SessionConfig, SlotDescriptor};
use broadcast_ipc::{AudioStats, Point, SessionState, TransmissionStats};

use crate::device::{DeviceDescriptor, DeviceHandle};
use crate::error::EngineError;
use crate::overlay::DecodedImage;
use crate::EngineResult;

/// Completion of a device attach or exchange.
pub type DeviceCompletion = Box<dyn FnOnce(Result<DeviceHandle, EngineError>) + Send>;

/// Completion of an image source attach or detach.
pub type SourceCompletion = Box<dyn FnOnce(Result<(), EngineError>) + Send>;

/// Signalled once no device-list mutation is in flight.
pub type SettledCallback = Box<dyn FnOnce() + Send>;

/// An image source created by the engine for one mixer slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageSourceHandle {
    id: u64,
    name: String,
}

impl ImageSourceHandle {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the slot the source was created for.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An engine-rendered camera preview, identified for the host's view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewView {
    pub id: u64,
    pub aspect: AspectMode,
    pub mirrored: bool,
}

/// Receives engine callbacks for one session.
///
/// Called on engine threads.
pub trait SessionDelegate: Send + Sync {
    /// The session changed state.
    fn state_changed(&self, state: SessionState, session_id: &str);

    /// The engine raised an error.
    fn error(&self, error: EngineError, session_id: &str);

    /// Unified transmission statistics.
    fn transmission_statistics_changed(&self, statistics: TransmissionStats);

    /// Legacy single-metric network health.
    fn network_health_changed(&self, health: f64);

    /// Legacy single-metric broadcast quality.
    fn broadcast_quality_changed(&self, quality: f64);

    /// Audio levels of the outgoing mix.
    fn audio_stats_updated(&self, stats: AudioStats);
}

/// Process-level entry point of the engine.
pub trait BroadcastEngine: Send + Sync {
    /// Devices that can currently be attached.
    fn list_available_devices(&self) -> Vec<DeviceDescriptor>;

    /// Apply the process-wide audio routing strategy.
    fn apply_audio_session_strategy(&self, strategy: AudioSessionStrategy);

    /// Create a session. The delegate stays subscribed for the session's
    /// whole lifetime.
    fn create_session(
        &self,
        config: &SessionConfig,
        delegate: Arc<dyn SessionDelegate>,
    ) -> EngineResult<Box<dyn EngineSession>>;

    /// Ramp the physical zoom factor of a camera at `rate` factor doublings
    /// per second.
    fn ramp_zoom(&self, camera: &DeviceDescriptor, factor: f64, rate: f32) -> EngineResult<()>;
}

/// A live engine session.
pub trait EngineSession {
    /// Engine-assigned session identifier.
    fn session_id(&self) -> String;

    /// Whether the session can start transmitting.
    fn is_ready(&self) -> bool;

    fn set_log_level(&self, level: LogLevel);

    /// Start transmitting.
    fn start(&self, url: &Url, stream_key: &str) -> EngineResult<()>;

    /// Stop transmitting.
    fn stop(&self);

    /// Attach a device to a mixer slot.
    fn attach_device(&self, device: &DeviceDescriptor, slot: &str, on_complete: DeviceCompletion);

    /// Replace an attached device with another one in the same slot.
    fn exchange_device(
        &self,
        old: &DeviceHandle,
        new: &DeviceDescriptor,
        on_complete: DeviceCompletion,
    );

    /// Invoke `on_settled` once no device-list mutation is in flight.
    fn await_device_changes(&self, on_settled: SettledCallback);

    /// Devices currently attached.
    fn list_attached_devices(&self) -> Vec<DeviceHandle>;

    /// Set the gain of an attached audio device.
    fn set_gain(&self, device: &DeviceHandle, gain: f32) -> EngineResult<()>;

    /// Focus an attached camera at a point of the preview.
    fn focus(&self, device: &DeviceHandle, point: Point) -> EngineResult<()>;

    /// Render the camera preview.
    fn preview_view(&self, aspect: AspectMode, mirrored: bool) -> EngineResult<PreviewView>;

    /// Add a mixer slot, replacing any slot with the same name.
    fn add_mixer_slot(&self, slot: &SlotDescriptor) -> EngineResult<()>;

    fn remove_mixer_slot(&self, name: &str) -> EngineResult<()>;

    /// Create an image source for a slot.
    fn create_image_source(&self, name: &str) -> ImageSourceHandle;

    fn attach_image_source(
        &self,
        source: &ImageSourceHandle,
        slot: &str,
        on_complete: SourceCompletion,
    );

    fn detach_image_source(&self, source: &ImageSourceHandle, on_complete: SourceCompletion);

    /// Feed a single static frame to an image source.
    fn submit_image(&self, source: &ImageSourceHandle, image: &DecodedImage) -> EngineResult<()>;
}
