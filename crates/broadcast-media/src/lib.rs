//! Contract with the external broadcast engine.
//!
//! The engine captures, encodes, mixes and transmits. This crate describes
//! what the session core needs from it: device enumeration and attachment,
//! mixer slots and image sources, zoom ramps, camera previews and the
//! delegate callbacks it reports through. Overlay image decoding lives here
//! too, behind [`ImageLoader`].

mod device;
mod engine;
mod error;
mod overlay;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use device::{
    find_device_by_urn, first_device_of_kind, BuiltInCamera, CameraPosition, DeviceDescriptor,
    DeviceHandle,
};
pub use engine::{
    BroadcastEngine, DeviceCompletion, EngineSession, ImageSourceHandle, PreviewView,
    SessionDelegate, SettledCallback, SourceCompletion,
};
pub use error::{EngineError, ImageError};
pub use overlay::{resolve_image, DecodedImage, DefaultImageLoader, ImageLoader, FETCHABLE_SCHEMES};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
