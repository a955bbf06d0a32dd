//! Capture device descriptors and handles.

use std::fmt;

use broadcast_config::InputKind;

/// Where a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraPosition {
    Back,
    Front,
    Unknown,
}

/// A device the engine can attach, identified by a stable URN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    /// Stable URN-like identifier.
    pub urn: String,

    /// Display name.
    pub friendly_name: String,

    pub kind: InputKind,

    pub position: CameraPosition,
}

impl DeviceDescriptor {
    /// Descriptor of a built-in camera.
    pub fn camera(camera: BuiltInCamera) -> Self {
        Self {
            urn: camera.urn().to_string(),
            friendly_name: camera.name().to_string(),
            kind: InputKind::Camera,
            position: camera.position(),
        }
    }

    /// Descriptor of a microphone.
    pub fn microphone(urn: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            urn: urn.into(),
            friendly_name: friendly_name.into(),
            kind: InputKind::Microphone,
            position: CameraPosition::Unknown,
        }
    }

    /// Returns true for devices whose gain controls outgoing audio.
    pub fn is_audio(&self) -> bool {
        matches!(self.kind, InputKind::Microphone | InputKind::UserAudio)
    }
}

/// A device currently attached to the session.
///
/// Handles are issued by the engine when an attach or exchange completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    id: u64,
    descriptor: DeviceDescriptor,
}

impl DeviceHandle {
    pub fn new(id: u64, descriptor: DeviceDescriptor) -> Self {
        Self { id, descriptor }
    }

    /// Engine-assigned attachment id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn urn(&self) -> &str {
        &self.descriptor.urn
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.descriptor.urn, self.id)
    }
}

/// Built-in cameras the zoom policy switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltInCamera {
    /// Back ultra-wide lens (0.5x native field of view).
    BackUltraWide,

    /// Back standard wide lens.
    BackWide,

    /// Front camera.
    Front,
}

impl BuiltInCamera {
    pub const ALL: [BuiltInCamera; 3] = [Self::BackUltraWide, Self::BackWide, Self::Front];

    /// Stable URN of this camera.
    pub fn urn(self) -> &'static str {
        match self {
            Self::BackUltraWide => "camera:builtin:back-ultra-wide",
            Self::BackWide => "camera:builtin:back-wide",
            Self::Front => "camera:builtin:front",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BackUltraWide => "Back Ultra Wide Camera",
            Self::BackWide => "Back Camera",
            Self::Front => "Front Camera",
        }
    }

    pub fn position(self) -> CameraPosition {
        match self {
            Self::BackUltraWide | Self::BackWide => CameraPosition::Back,
            Self::Front => CameraPosition::Front,
        }
    }

    /// Look a camera up by URN.
    pub fn from_urn(urn: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|camera| camera.urn() == urn)
    }
}

/// Find an available device by URN.
pub fn find_device_by_urn<'a>(
    devices: &'a [DeviceDescriptor],
    urn: &str,
) -> Option<&'a DeviceDescriptor> {
    devices.iter().find(|device| device.urn == urn)
}

/// Find the first available device of a kind.
pub fn first_device_of_kind(
    devices: &[DeviceDescriptor],
    kind: InputKind,
) -> Option<&DeviceDescriptor> {
    devices.iter().find(|device| device.kind == kind)
}
