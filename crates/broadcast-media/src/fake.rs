//! Scriptable in-memory engine for tests and demos.
//!
//! Asynchronous operations queue their completions until the caller
//! releases them with [`FakeEngine::complete_next`] or
//! [`FakeEngine::complete_all`], so interleavings are fully deterministic.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use broadcast_config::{AspectMode, AudioSessionStrategy, LogLevel, SessionConfig, SlotDescriptor};
use broadcast_ipc::{AudioStats, Point, SessionState, TransmissionStats};

use crate::device::{BuiltInCamera, DeviceDescriptor, DeviceHandle};
use crate::engine::{
    BroadcastEngine, DeviceCompletion, EngineSession, ImageSourceHandle, PreviewView,
    SessionDelegate, SettledCallback, SourceCompletion,
};
use crate::error::EngineError;
use crate::overlay::DecodedImage;
use crate::EngineResult;

/// URN of the fake engine's microphone.
pub const FAKE_MICROPHONE_URN: &str = "microphone:builtin:0";

/// A call the engine received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    ApplyAudioSessionStrategy(AudioSessionStrategy),
    CreateSession {
        width: u32,
        height: u32,
        bitrate: u32,
        transparency: bool,
    },
    SetLogLevel(LogLevel),
    Start { url: String, stream_key: String },
    Stop,
    AttachDevice { urn: String, slot: String },
    ExchangeDevice { old: String, new: String },
    AwaitDeviceChanges,
    SetGain { urn: String, gain: f32 },
    Focus { urn: String, point: Point },
    RampZoom { urn: String, factor: f64, rate: f32 },
    Preview { aspect: AspectMode, mirrored: bool },
    AddSlot(String),
    RemoveSlot(String),
    CreateSource { id: u64, name: String },
    AttachSource { id: u64, slot: String },
    DetachSource { id: u64 },
    SubmitImage { id: u64, width: u32, height: u32 },
}

enum PendingCompletion {
    Device {
        device: DeviceDescriptor,
        replaces: Option<DeviceHandle>,
        on_complete: DeviceCompletion,
    },
    AttachSource {
        source: ImageSourceHandle,
        slot: String,
        on_complete: SourceCompletion,
    },
    DetachSource {
        source: ImageSourceHandle,
        on_complete: SourceCompletion,
    },
    Settled(SettledCallback),
}

#[derive(Default)]
struct FakeState {
    available: Vec<DeviceDescriptor>,
    calls: Vec<EngineCall>,
    pending: VecDeque<PendingCompletion>,
    attached: Vec<DeviceHandle>,
    gains: HashMap<String, f32>,
    slots: Vec<SlotDescriptor>,
    bindings: HashMap<u64, String>,
    frames: HashMap<u64, (u32, u32)>,
    overlap_violations: usize,
    attach_failures: VecDeque<EngineError>,
    start_failure: Option<EngineError>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    sessions_created: usize,
    live_sessions: usize,
    ready: bool,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`BroadcastEngine`].
#[derive(Clone)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    /// Engine exposing the given devices.
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        let state = FakeState {
            available: devices,
            ready: true,
            ..Default::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Engine with every built-in camera and one microphone.
    pub fn with_default_devices() -> Self {
        let mut devices: Vec<_> = BuiltInCamera::ALL
            .into_iter()
            .map(DeviceDescriptor::camera)
            .collect();
        devices.push(DeviceDescriptor::microphone(
            FAKE_MICROPHONE_URN,
            "Built-in Microphone",
        ));
        Self::new(devices)
    }

    pub fn set_available_devices(&self, devices: Vec<DeviceDescriptor>) {
        self.state.lock().available = devices;
    }

    /// Make the next completed attach or exchange fail.
    pub fn fail_next_attach(&self, error: EngineError) {
        self.state.lock().attach_failures.push_back(error);
    }

    /// Make the next `start` fail.
    pub fn fail_next_start(&self, error: EngineError) {
        self.state.lock().start_failure = Some(error);
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    /// Run the oldest queued completion. Returns false if none was queued.
    pub fn complete_next(&self) -> bool {
        let pending = self.state.lock().pending.pop_front();
        let Some(pending) = pending else {
            return false;
        };

        match pending {
            PendingCompletion::Device {
                device,
                replaces,
                on_complete,
            } => {
                let result = {
                    let mut state = self.state.lock();
                    match state.attach_failures.pop_front() {
                        Some(error) => Err(error),
                        None => {
                            let handle = DeviceHandle::new(state.next_id(), device);
                            if let Some(old) = replaces {
                                state.attached.retain(|attached| attached != &old);
                            }
                            state.attached.push(handle.clone());
                            Ok(handle)
                        }
                    }
                };
                on_complete(result);
            }
            PendingCompletion::AttachSource {
                source,
                slot,
                on_complete,
            } => {
                {
                    let mut state = self.state.lock();
                    if state.bindings.values().any(|bound| bound == &slot) {
                        state.overlap_violations += 1;
                    }
                    state.bindings.insert(source.id(), slot);
                }
                on_complete(Ok(()));
            }
            PendingCompletion::DetachSource {
                source,
                on_complete,
            } => {
                self.state.lock().bindings.remove(&source.id());
                on_complete(Ok(()));
            }
            PendingCompletion::Settled(on_settled) => on_settled(),
        }

        true
    }

    /// Run queued completions until none are left. Returns how many ran.
    pub fn complete_all(&self) -> usize {
        let mut count = 0;
        while self.complete_next() {
            count += 1;
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of exchange calls received.
    pub fn exchange_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, EngineCall::ExchangeDevice { .. }))
            .count()
    }

    /// The most recent zoom ramp as (camera URN, factor).
    pub fn last_ramp(&self) -> Option<(String, f64)> {
        self.state.lock().calls.iter().rev().find_map(|call| match call {
            EngineCall::RampZoom { urn, factor, .. } => Some((urn.clone(), *factor)),
            _ => None,
        })
    }

    pub fn attached_urns(&self) -> Vec<String> {
        self.state
            .lock()
            .attached
            .iter()
            .map(|device| device.urn().to_string())
            .collect()
    }

    /// Last gain set on a device.
    pub fn gain(&self, urn: &str) -> Option<f32> {
        self.state.lock().gains.get(urn).copied()
    }

    /// Sources currently bound to a slot.
    pub fn live_sources(&self, slot: &str) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .state
            .lock()
            .bindings
            .iter()
            .filter(|(_, bound)| bound.as_str() == slot)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Sources bound to any slot.
    pub fn live_source_count(&self) -> usize {
        self.state.lock().bindings.len()
    }

    /// Dimensions of the frame last submitted to a source.
    pub fn submitted_frame(&self, source_id: u64) -> Option<(u32, u32)> {
        self.state.lock().frames.get(&source_id).copied()
    }

    /// Times a source was bound to a slot that already had a live source.
    pub fn overlap_violations(&self) -> usize {
        self.state.lock().overlap_violations
    }

    pub fn slot(&self, name: &str) -> Option<SlotDescriptor> {
        self.state
            .lock()
            .slots
            .iter()
            .find(|slot| slot.name == name)
            .cloned()
    }

    pub fn sessions_created(&self) -> usize {
        self.state.lock().sessions_created
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().live_sessions
    }

    /// Delegate of the live session, if any.
    pub fn session_delegate(&self) -> Option<Arc<dyn SessionDelegate>> {
        self.state.lock().delegate.clone()
    }

    /// Report a state change to the live session's delegate.
    pub fn emit_state(&self, state: SessionState) {
        if let Some(delegate) = self.session_delegate() {
            delegate.state_changed(state, &self.session_id());
        }
    }

    /// Report an error to the live session's delegate.
    pub fn emit_error(&self, error: EngineError) {
        if let Some(delegate) = self.session_delegate() {
            delegate.error(error, &self.session_id());
        }
    }

    pub fn emit_transmission_statistics(&self, statistics: TransmissionStats) {
        if let Some(delegate) = self.session_delegate() {
            delegate.transmission_statistics_changed(statistics);
        }
    }

    pub fn emit_network_health(&self, health: f64) {
        if let Some(delegate) = self.session_delegate() {
            delegate.network_health_changed(health);
        }
    }

    pub fn emit_broadcast_quality(&self, quality: f64) {
        if let Some(delegate) = self.session_delegate() {
            delegate.broadcast_quality_changed(quality);
        }
    }

    pub fn emit_audio_stats(&self, stats: AudioStats) {
        if let Some(delegate) = self.session_delegate() {
            delegate.audio_stats_updated(stats);
        }
    }

    fn session_id(&self) -> String {
        format!("fake-session-{}", self.state.lock().sessions_created)
    }
}

impl BroadcastEngine for FakeEngine {
    fn list_available_devices(&self) -> Vec<DeviceDescriptor> {
        self.state.lock().available.clone()
    }

    fn apply_audio_session_strategy(&self, strategy: AudioSessionStrategy) {
        self.state
            .lock()
            .calls
            .push(EngineCall::ApplyAudioSessionStrategy(strategy));
    }

    fn create_session(
        &self,
        config: &SessionConfig,
        delegate: Arc<dyn SessionDelegate>,
    ) -> EngineResult<Box<dyn EngineSession>> {
        let session_id = {
            let mut state = self.state.lock();
            state.calls.push(EngineCall::CreateSession {
                width: config.video.width,
                height: config.video.height,
                bitrate: config.video.initial_bitrate,
                transparency: config.enable_transparency,
            });
            state.sessions_created += 1;
            state.live_sessions += 1;
            state.slots = config.mixer_slots.clone();
            state.delegate = Some(delegate);
            format!("fake-session-{}", state.sessions_created)
        };

        debug!(session_id = %session_id, "Fake session created");

        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            session_id,
        }))
    }

    fn ramp_zoom(&self, camera: &DeviceDescriptor, factor: f64, rate: f32) -> EngineResult<()> {
        self.state.lock().calls.push(EngineCall::RampZoom {
            urn: camera.urn.clone(),
            factor,
            rate,
        });
        Ok(())
    }
}

struct FakeSession {
    state: Arc<Mutex<FakeState>>,
    session_id: String,
}

impl FakeSession {
    fn record(&self, call: EngineCall) {
        self.state.lock().calls.push(call);
    }

    fn enqueue(&self, pending: PendingCompletion) {
        self.state.lock().pending.push_back(pending);
    }
}

impl EngineSession for FakeSession {
    fn session_id(&self) -> String {
        self.session_id.clone()
    }

    fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    fn set_log_level(&self, level: LogLevel) {
        self.record(EngineCall::SetLogLevel(level));
    }

    fn start(&self, url: &Url, stream_key: &str) -> EngineResult<()> {
        let failure = {
            let mut state = self.state.lock();
            state.calls.push(EngineCall::Start {
                url: url.to_string(),
                stream_key: stream_key.to_string(),
            });
            state.start_failure.take()
        };

        if let Some(error) = failure {
            return Err(error);
        }

        let delegate = self.state.lock().delegate.clone();
        if let Some(delegate) = delegate {
            delegate.state_changed(SessionState::Connecting, &self.session_id);
            delegate.state_changed(SessionState::Connected, &self.session_id);
        }
        Ok(())
    }

    fn stop(&self) {
        self.record(EngineCall::Stop);
        let delegate = self.state.lock().delegate.clone();
        if let Some(delegate) = delegate {
            delegate.state_changed(SessionState::Disconnected, &self.session_id);
        }
    }

    fn attach_device(&self, device: &DeviceDescriptor, slot: &str, on_complete: DeviceCompletion) {
        self.record(EngineCall::AttachDevice {
            urn: device.urn.clone(),
            slot: slot.to_string(),
        });
        self.enqueue(PendingCompletion::Device {
            device: device.clone(),
            replaces: None,
            on_complete,
        });
    }

    fn exchange_device(
        &self,
        old: &DeviceHandle,
        new: &DeviceDescriptor,
        on_complete: DeviceCompletion,
    ) {
        self.record(EngineCall::ExchangeDevice {
            old: old.urn().to_string(),
            new: new.urn.clone(),
        });
        self.enqueue(PendingCompletion::Device {
            device: new.clone(),
            replaces: Some(old.clone()),
            on_complete,
        });
    }

    fn await_device_changes(&self, on_settled: SettledCallback) {
        self.record(EngineCall::AwaitDeviceChanges);
        self.enqueue(PendingCompletion::Settled(on_settled));
    }

    fn list_attached_devices(&self) -> Vec<DeviceHandle> {
        self.state.lock().attached.clone()
    }

    fn set_gain(&self, device: &DeviceHandle, gain: f32) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::SetGain {
            urn: device.urn().to_string(),
            gain,
        });
        state.gains.insert(device.urn().to_string(), gain);
        Ok(())
    }

    fn focus(&self, device: &DeviceHandle, point: Point) -> EngineResult<()> {
        self.record(EngineCall::Focus {
            urn: device.urn().to_string(),
            point,
        });
        Ok(())
    }

    fn preview_view(&self, aspect: AspectMode, mirrored: bool) -> EngineResult<PreviewView> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::Preview { aspect, mirrored });
        Ok(PreviewView {
            id: state.next_id(),
            aspect,
            mirrored,
        })
    }

    fn add_mixer_slot(&self, slot: &SlotDescriptor) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::AddSlot(slot.name.clone()));
        state.slots.retain(|existing| existing.name != slot.name);
        state.slots.push(slot.clone());
        Ok(())
    }

    fn remove_mixer_slot(&self, name: &str) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::RemoveSlot(name.to_string()));
        state.slots.retain(|existing| existing.name != name);
        Ok(())
    }

    fn create_image_source(&self, name: &str) -> ImageSourceHandle {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.calls.push(EngineCall::CreateSource {
            id,
            name: name.to_string(),
        });
        ImageSourceHandle::new(id, name)
    }

    fn attach_image_source(
        &self,
        source: &ImageSourceHandle,
        slot: &str,
        on_complete: SourceCompletion,
    ) {
        self.record(EngineCall::AttachSource {
            id: source.id(),
            slot: slot.to_string(),
        });
        self.enqueue(PendingCompletion::AttachSource {
            source: source.clone(),
            slot: slot.to_string(),
            on_complete,
        });
    }

    fn detach_image_source(&self, source: &ImageSourceHandle, on_complete: SourceCompletion) {
        self.record(EngineCall::DetachSource { id: source.id() });
        self.enqueue(PendingCompletion::DetachSource {
            source: source.clone(),
            on_complete,
        });
    }

    fn submit_image(&self, source: &ImageSourceHandle, image: &DecodedImage) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::SubmitImage {
            id: source.id(),
            width: image.width,
            height: image.height,
        });
        state.frames.insert(source.id(), (image.width, image.height));
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.live_sessions = state.live_sessions.saturating_sub(1);
        state.attached.clear();
        state.delegate = None;
        debug!(session_id = %self.session_id, "Fake session released");
    }
}
