//! Camera and microphone attachment, the zoom policy and mute.
//!
//! At most one camera and one microphone are attached at a time. Camera
//! requests never overlap: while an attach or exchange is in flight, later
//! requests only update the desired camera, and a single follow-up exchange
//! runs when the in-flight one completes.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, error, instrument, warn};

use broadcast_config::{InputKind, CAMERA_SLOT_NAME};
use broadcast_ipc::Point;
use broadcast_media::{
    find_device_by_urn, first_device_of_kind, BroadcastEngine, BuiltInCamera, DeviceDescriptor,
    DeviceHandle, EngineError, EngineSession,
};

use crate::completion::{CompletionSink, SettledTask};
use crate::error::SessionError;
use crate::SessionResult;

/// Smallest zoom ratio with a camera mapping. Lower finite ratios clamp to it.
pub const MIN_ZOOM: f64 = 0.5;

/// Ratios below this use the ultra-wide lens.
const WIDE_ZOOM: f64 = 1.0;

/// The ultra-wide lens covers twice the field of view of the wide lens.
const ULTRA_WIDE_OFFSET: f64 = 0.5;

/// Zoom ramp rate in factor doublings per second.
pub const ZOOM_RAMP_RATE: f32 = 5.0;

/// Receives the outcome of one camera or microphone request.
pub type DeviceWaiter = Sender<SessionResult<DeviceHandle>>;

/// The camera and physical zoom factor a zoom ratio maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTarget {
    pub camera: BuiltInCamera,
    pub factor: f64,
}

impl ZoomTarget {
    /// Map a continuous zoom ratio onto a back camera.
    pub fn for_ratio(ratio: f64) -> SessionResult<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(SessionError::InvalidZoom(ratio));
        }

        let ratio = ratio.max(MIN_ZOOM);
        let target = if ratio < WIDE_ZOOM {
            Self {
                camera: BuiltInCamera::BackUltraWide,
                factor: ratio + ULTRA_WIDE_OFFSET,
            }
        } else {
            Self {
                camera: BuiltInCamera::BackWide,
                factor: ratio,
            }
        };

        Ok(target)
    }
}

/// Gain applied to audio devices.
pub fn gain_for(muted: bool) -> f32 {
    if muted {
        0.0
    } else {
        1.0
    }
}

struct CameraRequest {
    device: DeviceDescriptor,
    waiters: Vec<DeviceWaiter>,
}

/// Device attachment state of one live session.
pub(crate) struct DeviceManager {
    engine: Arc<dyn BroadcastEngine>,
    sink: CompletionSink,
    camera: Option<DeviceHandle>,
    microphone: Option<DeviceHandle>,
    camera_in_flight: Option<CameraRequest>,
    camera_desired: Option<CameraRequest>,
    microphone_waiters: Option<Vec<DeviceWaiter>>,
}

impl DeviceManager {
    pub fn new(engine: Arc<dyn BroadcastEngine>, sink: CompletionSink) -> Self {
        Self {
            engine,
            sink,
            camera: None,
            microphone: None,
            camera_in_flight: None,
            camera_desired: None,
            microphone_waiters: None,
        }
    }

    pub fn camera(&self) -> Option<&DeviceHandle> {
        self.camera.as_ref()
    }

    pub fn microphone(&self) -> Option<&DeviceHandle> {
        self.microphone.as_ref()
    }

    /// Attach the camera with the given URN, exchanging any attached one.
    #[instrument(name = "attach_camera", skip(self, session, waiter))]
    pub fn attach_camera(
        &mut self,
        session: &dyn EngineSession,
        urn: &str,
        waiter: Option<DeviceWaiter>,
    ) -> SessionResult<()> {
        let available = self.engine.list_available_devices();
        let device = find_device_by_urn(&available, urn)
            .filter(|device| device.kind == InputKind::Camera)
            .cloned()
            .ok_or_else(|| SessionError::NoDeviceAvailable(format!("camera {}", urn)))?;

        self.request_camera(session, device, waiter.into_iter().collect());
        Ok(())
    }

    fn request_camera(
        &mut self,
        session: &dyn EngineSession,
        device: DeviceDescriptor,
        mut waiters: Vec<DeviceWaiter>,
    ) {
        if let Some(in_flight) = self.camera_in_flight.as_mut() {
            if self.camera_desired.is_none() && in_flight.device.urn == device.urn {
                in_flight.waiters.append(&mut waiters);
                return;
            }

            debug!(urn = %device.urn, "Camera operation in flight, recording desired camera");
            if let Some(mut superseded) = self.camera_desired.take() {
                superseded.waiters.append(&mut waiters);
                waiters = superseded.waiters;
            }
            self.camera_desired = Some(CameraRequest { device, waiters });
            return;
        }

        if let Some(ref camera) = self.camera {
            if camera.urn() == device.urn {
                notify(waiters, &Ok(camera.clone()));
                return;
            }
        }

        self.begin_camera_operation(session, CameraRequest { device, waiters });
    }

    fn begin_camera_operation(&mut self, session: &dyn EngineSession, request: CameraRequest) {
        match self.camera {
            Some(ref current) => {
                debug!(from = %current, to = %request.device.urn, "Exchanging camera");
                session.exchange_device(current, &request.device, self.sink.camera());
            }
            None => {
                debug!(urn = %request.device.urn, "Attaching camera");
                session.attach_device(&request.device, CAMERA_SLOT_NAME, self.sink.camera());
            }
        }
        self.camera_in_flight = Some(request);
    }

    /// Handle the completion of the in-flight camera attach or exchange.
    pub fn camera_completed(
        &mut self,
        session: &dyn EngineSession,
        result: Result<DeviceHandle, EngineError>,
    ) {
        let Some(request) = self.camera_in_flight.take() else {
            warn!("Camera completion without an operation in flight");
            return;
        };

        match result {
            Ok(handle) => {
                debug!(camera = %handle, "Camera attached");
                self.camera = Some(handle.clone());
                notify(request.waiters, &Ok(handle));
            }
            Err(e) => {
                error!(urn = %request.device.urn, "Camera attach failed: {}", e);
                notify(request.waiters, &Err(SessionError::DeviceOperation(e)));
            }
        }

        if let Some(desired) = self.camera_desired.take() {
            self.request_camera(session, desired.device, desired.waiters);
        }
    }

    /// Attach the first available microphone.
    #[instrument(name = "attach_microphone", skip(self, session, waiter))]
    pub fn attach_microphone(
        &mut self,
        session: &dyn EngineSession,
        waiter: Option<DeviceWaiter>,
    ) -> SessionResult<()> {
        if let Some(ref microphone) = self.microphone {
            notify(waiter.into_iter().collect(), &Ok(microphone.clone()));
            return Ok(());
        }

        if let Some(waiters) = self.microphone_waiters.as_mut() {
            waiters.extend(waiter);
            return Ok(());
        }

        let available = self.engine.list_available_devices();
        let device = first_device_of_kind(&available, InputKind::Microphone)
            .cloned()
            .ok_or_else(|| SessionError::NoDeviceAvailable("microphone".to_string()))?;

        debug!(urn = %device.urn, "Attaching microphone");
        session.attach_device(&device, CAMERA_SLOT_NAME, self.sink.microphone());
        self.microphone_waiters = Some(waiter.into_iter().collect());
        Ok(())
    }

    /// Handle the completion of the microphone attach and apply the mute
    /// state to it.
    pub fn microphone_completed(
        &mut self,
        session: &dyn EngineSession,
        result: Result<DeviceHandle, EngineError>,
        muted: bool,
    ) {
        let waiters = self.microphone_waiters.take().unwrap_or_default();

        match result {
            Ok(handle) => {
                debug!(microphone = %handle, muted, "Microphone attached");
                if let Err(e) = session.set_gain(&handle, gain_for(muted)) {
                    error!(microphone = %handle, "Failed to apply mute state: {}", e);
                }
                self.microphone = Some(handle.clone());
                notify(waiters, &Ok(handle));
            }
            Err(e) => {
                error!("Microphone attach failed: {}", e);
                notify(waiters, &Err(SessionError::DeviceOperation(e)));
            }
        }
    }

    /// Select the camera for a zoom ratio and ramp its zoom factor.
    ///
    /// The ramp does not wait for a camera exchange to complete.
    #[instrument(name = "set_zoom", skip(self, session))]
    pub fn set_zoom(&mut self, session: &dyn EngineSession, ratio: f64) -> SessionResult<ZoomTarget> {
        let target = ZoomTarget::for_ratio(ratio)?;

        let available = self.engine.list_available_devices();
        let device = find_device_by_urn(&available, target.camera.urn())
            .cloned()
            .ok_or_else(|| SessionError::NoDeviceAvailable(target.camera.name().to_string()))?;

        if let Err(e) = self.engine.ramp_zoom(&device, target.factor, ZOOM_RAMP_RATE) {
            warn!(camera = %device.urn, "Zoom ramp failed: {}", e);
        }

        self.request_camera(session, device, Vec::new());
        Ok(target)
    }

    /// Ask the engine to report back once the device list is stable.
    pub fn when_settled(&self, session: &dyn EngineSession, task: SettledTask) {
        session.await_device_changes(self.sink.settled(task));
    }

    /// Apply the mute state to every attached audio device.
    pub fn apply_mute(&self, session: &dyn EngineSession, muted: bool) {
        let gain = gain_for(muted);
        for device in session
            .list_attached_devices()
            .into_iter()
            .filter(|device| device.descriptor().is_audio())
        {
            match session.set_gain(&device, gain) {
                Ok(()) => debug!(device = %device, gain, "Gain applied"),
                Err(e) => error!(device = %device, "Failed to set gain: {}", e),
            }
        }
    }

    /// Focus the attached camera.
    pub fn focus(&self, session: &dyn EngineSession, point: Point) -> SessionResult<()> {
        let camera = self
            .camera
            .as_ref()
            .ok_or_else(|| SessionError::NoDeviceAvailable("camera".to_string()))?;
        session.focus(camera, point).map_err(SessionError::Engine)
    }

    /// Fail every outstanding request. Called when the session is torn down.
    pub fn release(&mut self) {
        let camera_waiters = self
            .camera_in_flight
            .take()
            .into_iter()
            .chain(self.camera_desired.take())
            .flat_map(|request| request.waiters);
        let microphone_waiters = self.microphone_waiters.take().unwrap_or_default();

        notify(
            camera_waiters.chain(microphone_waiters).collect(),
            &Err(SessionError::NotInitialized),
        );
        self.camera = None;
        self.microphone = None;
    }
}

fn notify(waiters: Vec<DeviceWaiter>, result: &SessionResult<DeviceHandle>) {
    for waiter in waiters {
        let _ = waiter.try_send(result.clone());
    }
}
