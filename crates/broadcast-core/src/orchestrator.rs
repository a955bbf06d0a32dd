//! Session lifecycle and the per-instance operations.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use broadcast_config::{
    AspectMode, AudioSessionLease, AudioSessionRegistry, ConfigurationBuilder, LogLevel,
    SessionConfig, SlotDescriptor,
};
use broadcast_ipc::{AudioOptions, OverlayEntry, Point, SessionState, VideoOptions};
use broadcast_media::{
    BroadcastEngine, BuiltInCamera, DeviceHandle, EngineSession, ImageLoader, ImageSourceHandle,
    SessionDelegate,
};

use crate::bridge::{EventBridge, EventHandlers};
use crate::completion::{completion_channel, Completion, CompletionSink, SettledTask, Stamped};
use crate::devices::{DeviceManager, ZoomTarget};
use crate::error::SessionError;
use crate::slots::{resolve_overlays, MixerSlotManager};
use crate::staged::Staged;
use crate::SessionResult;

/// URL schemes accepted for ingest endpoints.
pub const INGEST_SCHEMES: [&str; 2] = ["rtmp", "rtmps"];

/// Receives the outcome of an asynchronous device request.
pub type DeviceCompletionReceiver = Receiver<SessionResult<DeviceHandle>>;

struct LiveSession {
    session: Box<dyn EngineSession>,
    config: SessionConfig,
    sink: CompletionSink,
    bridge: Arc<EventBridge>,
    devices: DeviceManager,
    slots: MixerSlotManager,
    _audio_lease: AudioSessionLease,
}

/// Owns the broadcast session and everything bound to it.
///
/// Every method must be called from one thread: the control thread. Engine
/// completions are posted to an internal channel and only take effect when
/// that thread handles them (see [`Orchestrator::process_pending`]).
pub struct Orchestrator {
    engine: Arc<dyn BroadcastEngine>,
    loader: Arc<dyn ImageLoader>,
    handlers: Arc<EventHandlers>,
    state: Arc<RwLock<SessionState>>,
    audio_sessions: Arc<AudioSessionRegistry>,
    builder: ConfigurationBuilder,
    muted: Staged<bool>,
    session_log_level: Staged<Option<LogLevel>>,
    aspect_mode: Staged<AspectMode>,
    mirrored: Staged<bool>,
    overlays: Staged<Vec<OverlayEntry>>,
    live: Option<LiveSession>,
    epoch: u64,
    completion_tx: Sender<Stamped>,
    completion_rx: Receiver<Stamped>,
}

impl Orchestrator {
    /// Create an orchestrator using the process-wide audio session registry.
    pub fn new(engine: Arc<dyn BroadcastEngine>, loader: Arc<dyn ImageLoader>) -> Self {
        Self::with_shared(
            engine,
            loader,
            Arc::new(EventHandlers::new()),
            Arc::new(RwLock::new(SessionState::default())),
            AudioSessionRegistry::global(),
        )
    }

    pub(crate) fn with_shared(
        engine: Arc<dyn BroadcastEngine>,
        loader: Arc<dyn ImageLoader>,
        handlers: Arc<EventHandlers>,
        state: Arc<RwLock<SessionState>>,
        audio_sessions: Arc<AudioSessionRegistry>,
    ) -> Self {
        let (completion_tx, completion_rx) = completion_channel();
        Self {
            engine,
            loader,
            handlers,
            state,
            audio_sessions,
            builder: ConfigurationBuilder::new(),
            muted: Staged::default(),
            session_log_level: Staged::default(),
            aspect_mode: Staged::default(),
            mirrored: Staged::default(),
            overlays: Staged::default(),
            live: None,
            epoch: 0,
            completion_tx,
            completion_rx,
        }
    }

    /// Use a specific audio session registry instead of the global one.
    pub fn with_audio_sessions(mut self, registry: Arc<AudioSessionRegistry>) -> Self {
        self.audio_sessions = registry;
        self
    }

    /// Event handler registry shared with the engine callbacks.
    pub fn handlers(&self) -> &Arc<EventHandlers> {
        &self.handlers
    }

    pub(crate) fn completions(&self) -> Receiver<Stamped> {
        self.completion_rx.clone()
    }

    fn live(&self) -> SessionResult<&LiveSession> {
        self.live.as_ref().ok_or(SessionError::NotInitialized)
    }

    fn live_mut(&mut self) -> SessionResult<&mut LiveSession> {
        self.live.as_mut().ok_or(SessionError::NotInitialized)
    }

    /// Build the configuration, create the engine session and attach the
    /// default devices and any staged overlays.
    #[instrument(name = "initiate", skip(self))]
    pub fn initiate(&mut self) -> SessionResult<()> {
        if self.live.is_some() {
            warn!("Session already initialized");
            return Err(SessionError::AlreadyInitialized);
        }

        let mut config = self.builder.build()?;
        config.mixer_slots = vec![SlotDescriptor::camera()];
        config.enable_transparency = true;

        if let Some(strategy) = self.builder.audio_session_strategy()? {
            self.audio_sessions.set_strategy(strategy)?;
        }
        let audio_lease = AudioSessionRegistry::acquire(&self.audio_sessions);
        self.engine.apply_audio_session_strategy(audio_lease.strategy());

        let bridge = Arc::new(EventBridge::new(
            Arc::clone(&self.handlers),
            Arc::clone(&self.state),
        ));
        let session = self
            .engine
            .create_session(&config, Arc::clone(&bridge) as Arc<dyn SessionDelegate>)
            .map_err(|e| {
            error!("Failed to create session: {}", e);
            SessionError::Engine(e)
        })?;

        self.epoch += 1;
        let sink = CompletionSink::new(self.epoch, self.completion_tx.clone());

        let log_level = (*self.session_log_level.resolve()).unwrap_or(config.log_level);
        session.set_log_level(log_level);

        info!(
            session_id = %session.session_id(),
            width = config.video.width,
            height = config.video.height,
            bitrate = config.video.initial_bitrate,
            log_level = log_level.name(),
            "Session initiated"
        );

        self.live = Some(LiveSession {
            devices: DeviceManager::new(Arc::clone(&self.engine), sink.clone()),
            slots: MixerSlotManager::new(sink.clone()),
            sink,
            bridge,
            session,
            config,
            _audio_lease: audio_lease,
        });

        // Applied to the microphone when its attach completes.
        self.muted.resolve();

        if let Err(e) = self.attach_camera(BuiltInCamera::BackWide.urn()) {
            warn!("Starting without a camera: {}", e);
        }
        if let Err(e) = self.attach_microphone() {
            warn!("Continuing video-only: {}", e);
        }

        self.aspect_mode.resolve();
        self.mirrored.resolve();
        self.request_preview();

        let overlays = self.overlays.resolve().clone();
        if !overlays.is_empty() {
            self.load_overlays(overlays);
        }

        Ok(())
    }

    /// Stop transmitting, release every device and overlay and drop the
    /// session. Does nothing without a session.
    #[instrument(name = "deinitiate", skip(self))]
    pub fn deinitiate(&mut self) {
        let Some(mut live) = self.live.take() else {
            debug!("Session not initialized, nothing to tear down");
            return;
        };

        let transmitting = self.state.read().is_transmitting();
        if transmitting {
            info!("Stopping transmission before teardown");
            live.session.stop();
        }

        live.slots.release_all(&*live.session);
        live.devices.release();
        live.bridge.detach();

        self.muted.reset();
        self.session_log_level.reset();
        self.aspect_mode.reset();
        self.mirrored.reset();
        self.overlays.reset();
        *self.state.write() = SessionState::Uninitialized;

        info!(session_id = %live.session.session_id(), "Session deinitiated");
    }

    pub fn is_initialized(&self) -> bool {
        self.live.is_some()
    }

    /// The engine's readiness signal. False without a session.
    pub fn is_ready(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| live.session.is_ready())
    }

    /// Last state reported by the engine.
    pub fn session_state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn session_id(&self) -> Option<String> {
        self.live.as_ref().map(|live| live.session.session_id())
    }

    /// Configuration handed to the live session.
    pub fn config(&self) -> Option<&SessionConfig> {
        self.live.as_ref().map(|live| &live.config)
    }

    /// Start transmitting to an `rtmp` or `rtmps` endpoint.
    #[instrument(name = "start", skip(self, stream_key))]
    pub fn start(&mut self, url: &str, stream_key: &str) -> SessionResult<()> {
        let live = self.live()?;
        let url = parse_ingest_url(url, stream_key)?;

        live.session.start(&url, stream_key).map_err(|e| {
            error!("Broadcast start failed: {}", e);
            SessionError::EngineStart(e)
        })?;

        info!(host = url.host_str(), "Broadcast started");
        Ok(())
    }

    #[instrument(name = "stop", skip(self))]
    pub fn stop(&mut self) -> SessionResult<()> {
        let live = self.live()?;
        live.session.stop();
        info!("Broadcast stopped");
        Ok(())
    }

    /// Attach a camera by URN. The receiver yields the attach outcome.
    pub fn attach_camera(&mut self, urn: &str) -> SessionResult<DeviceCompletionReceiver> {
        let (waiter, receiver) = crossbeam_channel::bounded(1);
        let live = self.live_mut()?;
        live.devices
            .attach_camera(&*live.session, urn, Some(waiter))?;
        Ok(receiver)
    }

    /// Attach the first available microphone. The receiver yields the
    /// attach outcome.
    pub fn attach_microphone(&mut self) -> SessionResult<DeviceCompletionReceiver> {
        let (waiter, receiver) = crossbeam_channel::bounded(1);
        let live = self.live_mut()?;
        live.devices
            .attach_microphone(&*live.session, Some(waiter))?;
        Ok(receiver)
    }

    pub fn camera(&self) -> Option<&DeviceHandle> {
        self.live.as_ref().and_then(|live| live.devices.camera())
    }

    pub fn microphone(&self) -> Option<&DeviceHandle> {
        self.live.as_ref().and_then(|live| live.devices.microphone())
    }

    /// Select the camera for a zoom ratio and ramp its zoom.
    pub fn set_zoom(&mut self, ratio: f64) -> SessionResult<ZoomTarget> {
        let live = self.live_mut()?;
        live.devices.set_zoom(&*live.session, ratio)
    }

    /// Mute or unmute audio. Staged until initiation.
    pub fn set_is_muted(&mut self, muted: bool) {
        self.muted.set(muted, self.live.is_some());
        debug!(muted, staged = self.muted.is_pending(), "Mute state set");

        if let Some(ref live) = self.live {
            live.devices
                .when_settled(&*live.session, SettledTask::ApplyMute);
        }
    }

    pub fn is_muted(&self) -> bool {
        *self.muted.value()
    }

    /// Set the engine log level, live or staged.
    pub fn set_session_log_level(&mut self, name: &str) -> SessionResult<()> {
        let level: LogLevel = name.parse()?;
        self.session_log_level.set(Some(level), self.live.is_some());

        if let Some(ref live) = self.live {
            live.session.set_log_level(level);
        }
        Ok(())
    }

    /// Set the configuration-level log level. Only before initiation.
    pub fn set_log_level(&mut self, name: &str) -> SessionResult<()> {
        self.ensure_configurable()?;
        self.builder.set_log_level(name.parse()?);
        Ok(())
    }

    pub fn set_configuration_preset(&mut self, name: &str) -> SessionResult<()> {
        self.ensure_configurable()?;
        self.builder.set_preset_name(name)?;
        Ok(())
    }

    pub fn set_video_config(&mut self, options: VideoOptions) -> SessionResult<()> {
        self.ensure_configurable()?;
        self.builder.set_video_options(options)?;
        Ok(())
    }

    pub fn set_audio_config(&mut self, options: AudioOptions) -> SessionResult<()> {
        self.ensure_configurable()?;
        self.builder.set_audio_options(options)?;
        Ok(())
    }

    fn ensure_configurable(&self) -> SessionResult<()> {
        if self.live.is_some() {
            return Err(SessionError::AlreadyInitialized);
        }
        Ok(())
    }

    /// Replace the overlay set. Staged until initiation.
    pub fn set_overlay_config(&mut self, entries: Vec<OverlayEntry>) {
        let live = self.live.is_some();
        self.overlays.set(entries.clone(), live);
        if live {
            self.load_overlays(entries);
        }
    }

    /// Resolve overlay images off the control thread; the result comes back
    /// as a completion.
    fn load_overlays(&mut self, entries: Vec<OverlayEntry>) {
        let Some(live) = self.live.as_mut() else {
            return;
        };

        let generation = live.slots.next_generation();
        let sink = live.sink.clone();
        let loader = Arc::clone(&self.loader);
        debug!(generation, entries = entries.len(), "Resolving overlays");

        let spawned = thread::Builder::new()
            .name("overlay-resolver".to_string())
            .spawn(move || {
                let names = entries.iter().map(|entry| entry.name.clone()).collect();
                let overlays = resolve_overlays(&*loader, &entries);
                sink.send(Completion::OverlaysResolved {
                    generation,
                    names,
                    overlays,
                });
            });

        if let Err(e) = spawned {
            error!("Failed to spawn overlay resolver: {}", e);
        }
    }

    /// Source bound to an overlay slot.
    pub fn overlay_source(&self, name: &str) -> Option<&ImageSourceHandle> {
        self.live
            .as_ref()
            .and_then(|live| live.slots.bound_source(name))
    }

    /// Names of the overlay slots in the live mix.
    pub fn overlay_slots(&self) -> Vec<String> {
        self.live
            .as_ref()
            .map(|live| live.slots.slot_names())
            .unwrap_or_default()
    }

    pub fn set_camera_preview_aspect_mode(&mut self, name: &str) -> SessionResult<()> {
        let aspect: AspectMode = name.parse()?;
        self.aspect_mode.set(aspect, self.live.is_some());
        self.request_preview();
        Ok(())
    }

    pub fn set_is_camera_preview_mirrored(&mut self, mirrored: bool) {
        self.mirrored.set(mirrored, self.live.is_some());
        self.request_preview();
    }

    fn request_preview(&self) {
        if let Some(ref live) = self.live {
            live.devices
                .when_settled(&*live.session, SettledTask::RenderPreview);
        }
    }

    /// Focus the attached camera at a point of the preview.
    pub fn focus(&mut self, point: Point) -> SessionResult<()> {
        let live = self.live()?;
        live.devices.focus(&*live.session, point)
    }

    /// Apply one engine completion. Completions from a torn-down session are
    /// dropped.
    pub(crate) fn handle_completion(&mut self, stamped: Stamped) {
        let muted = *self.muted.value();
        let aspect = *self.aspect_mode.value();
        let mirrored = *self.mirrored.value();

        let Some(live) = self
            .live
            .as_mut()
            .filter(|live| live.sink.epoch() == stamped.epoch)
        else {
            warn!(
                epoch = stamped.epoch,
                "Dropping completion for a torn-down session"
            );
            return;
        };
        let session = &*live.session;

        match stamped.completion {
            Completion::Camera(result) => live.devices.camera_completed(session, result),
            Completion::Microphone(result) => {
                live.devices.microphone_completed(session, result, muted)
            }
            Completion::DevicesSettled(SettledTask::ApplyMute) => {
                live.devices.apply_mute(session, muted)
            }
            Completion::DevicesSettled(SettledTask::RenderPreview) => {
                match session.preview_view(aspect, mirrored) {
                    Ok(view) => {
                        if !self.handlers.present_preview(view) {
                            debug!("No preview handler registered");
                        }
                    }
                    Err(e) => error!("Failed to render camera preview: {}", e),
                }
            }
            Completion::SourceAttached {
                slot,
                source,
                result,
            } => live.slots.source_attached(session, &slot, source, result),
            Completion::SourceDetached {
                slot,
                source,
                result,
            } => live.slots.source_detached(session, &slot, source, result),
            Completion::OverlaysResolved {
                generation,
                names,
                overlays,
            } => live.slots.apply(session, generation, &names, overlays),
        }
    }

    /// Handle every completion already posted. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(stamped) = self.completion_rx.try_recv() {
            self.handle_completion(stamped);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for one completion and handle it.
    pub fn wait_for_message(&mut self, timeout: Duration) -> bool {
        match self.completion_rx.recv_timeout(timeout) {
            Ok(stamped) => {
                self.handle_completion(stamped);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.deinitiate();
    }
}

/// Check an ingest endpoint and stream key.
pub fn parse_ingest_url(url: &str, stream_key: &str) -> SessionResult<Url> {
    let parsed =
        Url::parse(url).map_err(|e| SessionError::InvalidUrl(format!("{}: {}", url, e)))?;

    if !INGEST_SCHEMES.contains(&parsed.scheme()) {
        return Err(SessionError::InvalidUrl(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(SessionError::InvalidUrl(format!("{}: missing host", url)));
    }
    if stream_key.trim().is_empty() {
        return Err(SessionError::InvalidUrl("empty stream key".to_string()));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use broadcast_config::{AudioSessionStrategy, ConfigError, CAMERA_Z_INDEX};
    use broadcast_ipc::{BroadcastEvent, EventKind};
    use broadcast_media::fake::{EngineCall, FakeEngine, FAKE_MICROPHONE_URN};
    use broadcast_media::{DecodedImage, DeviceDescriptor, EngineError, ImageError};
    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    /// Decodes paths of the form `/img/<width>x<height>` into blank images.
    struct BlankLoader;

    impl ImageLoader for BlankLoader {
        fn decode_file(&self, path: &Path) -> Result<DecodedImage, ImageError> {
            let name = path.to_string_lossy();
            let unsupported = || ImageError::UnsupportedUri(name.to_string());
            let (width, height) = name
                .strip_prefix("/img/")
                .and_then(|size| size.split_once('x'))
                .ok_or_else(unsupported)?;
            let width: u32 = width.parse().map_err(|_| unsupported())?;
            let height: u32 = height.parse().map_err(|_| unsupported())?;
            let data = Bytes::from(vec![0; DecodedImage::rgba_buffer_size(width, height)]);
            Ok(DecodedImage::new(width, height, data))
        }

        fn fetch(&self, url: &Url) -> Result<DecodedImage, ImageError> {
            Err(ImageError::Fetch(url.to_string()))
        }
    }

    fn orchestrator(engine: &FakeEngine) -> Orchestrator {
        Orchestrator::new(Arc::new(engine.clone()), Arc::new(BlankLoader))
            .with_audio_sessions(Arc::new(AudioSessionRegistry::new()))
    }

    /// Release engine completions until neither side has work left.
    fn settle(engine: &FakeEngine, orchestrator: &mut Orchestrator) {
        loop {
            let completed = engine.complete_all();
            let handled = orchestrator.process_pending();
            if completed == 0 && handled == 0 {
                break;
            }
        }
    }

    fn initiated(engine: &FakeEngine) -> Orchestrator {
        let mut orchestrator = orchestrator(engine);
        orchestrator.initiate().unwrap();
        settle(engine, &mut orchestrator);
        orchestrator
    }

    fn overlay(name: &str, uri: &str) -> OverlayEntry {
        OverlayEntry {
            name: name.to_string(),
            uri: uri.to_string(),
            size: None,
            position: None,
        }
    }

    fn apply_overlays(
        engine: &FakeEngine,
        orchestrator: &mut Orchestrator,
        entries: Vec<OverlayEntry>,
    ) {
        orchestrator.set_overlay_config(entries);
        assert!(orchestrator.wait_for_message(WAIT), "overlay resolution timed out");
        settle(engine, orchestrator);
    }

    fn camera_urn(orchestrator: &Orchestrator) -> Option<String> {
        orchestrator.camera().map(|camera| camera.urn().to_string())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_initiate_twice_fails() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        orchestrator.initiate().unwrap();
        let session_id = orchestrator.session_id();

        assert_eq!(orchestrator.initiate(), Err(SessionError::AlreadyInitialized));
        assert_eq!(engine.sessions_created(), 1);
        assert_eq!(orchestrator.session_id(), session_id);
    }

    #[test]
    fn test_initiate_enables_transparency() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        orchestrator.initiate().unwrap();

        assert!(orchestrator.config().unwrap().enable_transparency);
        assert!(engine.calls().iter().any(|call| matches!(
            call,
            EngineCall::CreateSession {
                transparency: true,
                ..
            }
        )));
    }

    #[test]
    fn test_callbacks_from_torn_down_session_are_ignored() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        let state_events = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&state_events);
        orchestrator
            .handlers()
            .set(EventKind::StateChanged, move |event| recorded.lock().push(event));

        orchestrator.initiate().unwrap();
        let delegate = engine.session_delegate().unwrap();
        orchestrator.deinitiate();

        delegate.state_changed(SessionState::Connected, "fake-session-1");
        assert_eq!(orchestrator.session_state(), SessionState::Uninitialized);
        assert!(state_events.lock().is_empty());

        // A later session must not inherit the stale transmitting state.
        orchestrator.initiate().unwrap();
        engine.clear_calls();
        orchestrator.deinitiate();
        assert!(!engine.calls().contains(&EngineCall::Stop));
    }

    #[test]
    fn test_initiate_attaches_default_devices() {
        let engine = FakeEngine::with_default_devices();
        let orchestrator = initiated(&engine);

        assert!(orchestrator.is_initialized());
        assert!(orchestrator.is_ready());
        assert_eq!(
            camera_urn(&orchestrator).as_deref(),
            Some(BuiltInCamera::BackWide.urn())
        );
        assert_eq!(
            orchestrator.microphone().map(DeviceHandle::urn),
            Some(FAKE_MICROPHONE_URN)
        );

        let camera_slot = engine.slot("camera").unwrap();
        assert_eq!(camera_slot.z_index, CAMERA_Z_INDEX);
    }

    #[test]
    fn test_not_ready_before_initiation() {
        let engine = FakeEngine::with_default_devices();
        let orchestrator = orchestrator(&engine);

        assert!(!orchestrator.is_initialized());
        assert!(!orchestrator.is_ready());
        assert_eq!(orchestrator.session_state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_zoom_switches_cameras_once_per_range() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        let target = orchestrator.set_zoom(0.5).unwrap();
        assert_eq!(target.camera, BuiltInCamera::BackUltraWide);
        settle(&engine, &mut orchestrator);
        let (urn, factor) = engine.last_ramp().unwrap();
        assert_eq!(urn, BuiltInCamera::BackUltraWide.urn());
        assert_close(factor, 1.0);
        assert_eq!(engine.exchange_count(), 1);

        orchestrator.set_zoom(0.99).unwrap();
        settle(&engine, &mut orchestrator);
        assert_close(engine.last_ramp().unwrap().1, 1.49);
        assert_eq!(engine.exchange_count(), 1);
        assert_eq!(
            camera_urn(&orchestrator).as_deref(),
            Some(BuiltInCamera::BackUltraWide.urn())
        );

        orchestrator.set_zoom(1.0).unwrap();
        settle(&engine, &mut orchestrator);
        let (urn, factor) = engine.last_ramp().unwrap();
        assert_eq!(urn, BuiltInCamera::BackWide.urn());
        assert_close(factor, 1.0);
        assert_eq!(engine.exchange_count(), 2);

        orchestrator.set_zoom(2.5).unwrap();
        settle(&engine, &mut orchestrator);
        assert_close(engine.last_ramp().unwrap().1, 2.5);
        assert_eq!(engine.exchange_count(), 2);
    }

    #[test]
    fn test_ramp_does_not_wait_for_exchange() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        orchestrator.set_zoom(0.7).unwrap();
        assert_eq!(engine.pending_count(), 1);
        let (urn, factor) = engine.last_ramp().unwrap();
        assert_eq!(urn, BuiltInCamera::BackUltraWide.urn());
        assert_close(factor, 1.2);
    }

    #[test]
    fn test_camera_requests_coalesce_while_in_flight() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        orchestrator.set_zoom(0.6).unwrap();
        orchestrator.set_zoom(1.5).unwrap();
        orchestrator.set_zoom(0.7).unwrap();
        orchestrator.set_zoom(1.2).unwrap();
        assert_eq!(engine.exchange_count(), 1);

        // The follow-up goes straight to the latest desired camera.
        assert!(engine.complete_next());
        orchestrator.process_pending();
        assert_eq!(engine.exchange_count(), 2);

        settle(&engine, &mut orchestrator);
        assert_eq!(engine.exchange_count(), 2);
        assert_eq!(
            camera_urn(&orchestrator).as_deref(),
            Some(BuiltInCamera::BackWide.urn())
        );
    }

    #[test]
    fn test_failed_exchange_keeps_previous_camera() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        engine.fail_next_attach(EngineError::new(-7, "Device", "Camera busy"));
        let outcome = orchestrator
            .attach_camera(BuiltInCamera::Front.urn())
            .unwrap();
        settle(&engine, &mut orchestrator);

        assert!(matches!(
            outcome.try_recv(),
            Ok(Err(SessionError::DeviceOperation(_)))
        ));
        assert_eq!(
            camera_urn(&orchestrator).as_deref(),
            Some(BuiltInCamera::BackWide.urn())
        );
    }

    #[test]
    fn test_attach_camera_reports_handle() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        let outcome = orchestrator
            .attach_camera(BuiltInCamera::Front.urn())
            .unwrap();
        settle(&engine, &mut orchestrator);

        let handle = outcome.try_recv().unwrap().unwrap();
        assert_eq!(handle.urn(), BuiltInCamera::Front.urn());
        assert!(matches!(
            orchestrator.attach_camera("camera:usb:9"),
            Err(SessionError::NoDeviceAvailable(_))
        ));
    }

    #[test]
    fn test_mute_before_initiation_applies_on_microphone_attach() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        orchestrator.set_is_muted(true);
        orchestrator.initiate().unwrap();

        // Release the camera and microphone attaches only.
        assert!(engine.complete_next());
        assert!(engine.complete_next());
        orchestrator.process_pending();

        assert!(orchestrator.microphone().is_some());
        assert_eq!(engine.gain(FAKE_MICROPHONE_URN), Some(0.0));
    }

    #[test]
    fn test_live_mute_waits_for_device_changes() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);
        assert_eq!(engine.gain(FAKE_MICROPHONE_URN), Some(1.0));

        orchestrator.set_is_muted(true);
        assert_eq!(engine.gain(FAKE_MICROPHONE_URN), Some(1.0));

        settle(&engine, &mut orchestrator);
        assert_eq!(engine.gain(FAKE_MICROPHONE_URN), Some(0.0));

        orchestrator.set_is_muted(false);
        settle(&engine, &mut orchestrator);
        assert_eq!(engine.gain(FAKE_MICROPHONE_URN), Some(1.0));
    }

    #[test]
    fn test_missing_microphone_continues_video_only() {
        let engine = FakeEngine::new(
            BuiltInCamera::ALL
                .into_iter()
                .map(DeviceDescriptor::camera)
                .collect(),
        );
        let mut orchestrator = initiated(&engine);

        assert!(orchestrator.camera().is_some());
        assert!(orchestrator.microphone().is_none());
        assert!(matches!(
            orchestrator.attach_microphone(),
            Err(SessionError::NoDeviceAvailable(_))
        ));
    }

    #[test]
    fn test_duplicate_overlay_names_keep_last_image() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        apply_overlays(
            &engine,
            &mut orchestrator,
            vec![overlay("logo", "/img/4x4"), overlay("logo", "/img/8x6")],
        );

        let live = engine.live_sources("logo");
        assert_eq!(live.len(), 1);
        assert_eq!(engine.submitted_frame(live[0]), Some((8, 6)));
        assert_eq!(orchestrator.overlay_source("logo").map(|s| s.id()), Some(live[0]));
        assert_eq!(engine.overlap_violations(), 0);
    }

    #[test]
    fn test_overlay_replacement_detaches_before_attach() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        apply_overlays(&engine, &mut orchestrator, vec![overlay("logo", "/img/4x4")]);
        let first = engine.live_sources("logo")[0];

        apply_overlays(&engine, &mut orchestrator, vec![overlay("logo", "/img/2x2")]);
        let second = engine.live_sources("logo")[0];
        assert_ne!(first, second);

        let calls = engine.calls();
        let detached = calls
            .iter()
            .position(|call| *call == EngineCall::DetachSource { id: first })
            .unwrap();
        let attached = calls
            .iter()
            .position(|call| {
                *call
                    == EngineCall::AttachSource {
                        id: second,
                        slot: "logo".to_string(),
                    }
            })
            .unwrap();
        assert!(detached < attached);
        assert_eq!(engine.overlap_violations(), 0);
    }

    #[test]
    fn test_overlay_set_is_replaced_as_a_whole() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        apply_overlays(
            &engine,
            &mut orchestrator,
            vec![overlay("logo", "/img/4x4"), overlay("badge", "/img/2x2")],
        );
        assert_eq!(orchestrator.overlay_slots(), vec!["badge", "logo"]);

        apply_overlays(&engine, &mut orchestrator, vec![overlay("badge", "/img/2x2")]);
        assert_eq!(orchestrator.overlay_slots(), vec!["badge"]);
        assert!(engine.live_sources("logo").is_empty());
        assert!(engine.slot("logo").is_none());
        assert_eq!(engine.live_sources("badge").len(), 1);
    }

    #[test]
    fn test_unresolvable_overlay_does_not_abort_others() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        apply_overlays(
            &engine,
            &mut orchestrator,
            vec![
                overlay("remote", "https://example.com/logo.png"),
                overlay("weird", "ftp://example.com/logo.png"),
                overlay("logo", "/img/4x4"),
            ],
        );

        assert_eq!(orchestrator.overlay_slots(), vec!["logo"]);
        let slot = engine.slot("logo").unwrap();
        assert_eq!(
            slot.size,
            Some(broadcast_ipc::Size {
                width: 4,
                height: 4
            })
        );
    }

    #[test]
    fn test_overlays_staged_until_initiation() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        orchestrator.set_overlay_config(vec![overlay("logo", "/img/4x4")]);
        assert!(orchestrator.overlay_slots().is_empty());

        orchestrator.initiate().unwrap();
        assert!(orchestrator.wait_for_message(WAIT));
        settle(&engine, &mut orchestrator);

        assert_eq!(engine.live_sources("logo").len(), 1);
    }

    #[test]
    fn test_superseded_overlay_resolution_is_discarded() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        orchestrator.set_overlay_config(vec![overlay("old", "/img/4x4")]);
        orchestrator.set_overlay_config(vec![overlay("new", "/img/4x4")]);
        assert!(orchestrator.wait_for_message(WAIT));
        assert!(orchestrator.wait_for_message(WAIT));
        settle(&engine, &mut orchestrator);

        assert_eq!(orchestrator.overlay_slots(), vec!["new"]);
        assert!(engine.slot("old").is_none());
    }

    #[test]
    fn test_completions_after_teardown_are_ignored() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        orchestrator.initiate().unwrap();
        orchestrator.deinitiate();

        assert!(engine.complete_all() > 0);
        assert!(orchestrator.process_pending() > 0);
        assert!(!orchestrator.is_initialized());
        assert!(orchestrator.camera().is_none());

        orchestrator.initiate().unwrap();
        settle(&engine, &mut orchestrator);
        assert_eq!(engine.sessions_created(), 2);
        assert!(orchestrator.camera().is_some());
    }

    #[test]
    fn test_deinitiate_without_session_is_noop() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        orchestrator.deinitiate();
        assert!(!orchestrator.is_initialized());
        assert_eq!(engine.sessions_created(), 0);
    }

    #[test]
    fn test_start_validation() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        assert_eq!(
            orchestrator.start("rtmps://ingest.example.com/app", "key"),
            Err(SessionError::NotInitialized)
        );

        orchestrator.initiate().unwrap();
        for (url, key) in [
            ("https://ingest.example.com/app", "key"),
            ("not a url", "key"),
            ("rtmps://ingest.example.com/app", "  "),
        ] {
            assert!(matches!(
                orchestrator.start(url, key),
                Err(SessionError::InvalidUrl(_))
            ));
        }

        engine.fail_next_start(EngineError::new(3, "Network", "Handshake failed"));
        assert!(matches!(
            orchestrator.start("rtmp://ingest.example.com/app", "key"),
            Err(SessionError::EngineStart(_))
        ));

        orchestrator
            .start("rtmp://ingest.example.com/app", "key")
            .unwrap();
        assert_eq!(orchestrator.session_state(), SessionState::Connected);
    }

    #[test]
    fn test_broadcast_scenario() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        orchestrator
            .set_configuration_preset("standardPortrait")
            .unwrap();
        orchestrator
            .set_video_config(VideoOptions {
                bitrate: Some(2_000_000),
                ..Default::default()
            })
            .unwrap();
        orchestrator.initiate().unwrap();
        settle(&engine, &mut orchestrator);

        let config = orchestrator.config().unwrap();
        assert_eq!((config.video.width, config.video.height), (720, 1280));
        assert_eq!(config.video.initial_bitrate, 2_000_000);

        apply_overlays(&engine, &mut orchestrator, vec![overlay("logo", "/img/4x4")]);

        orchestrator.set_zoom(0.7).unwrap();
        settle(&engine, &mut orchestrator);
        assert_eq!(
            camera_urn(&orchestrator).as_deref(),
            Some(BuiltInCamera::BackUltraWide.urn())
        );
        assert_close(engine.last_ramp().unwrap().1, 1.2);

        orchestrator
            .start("rtmps://ingest.example.com:443/app/", "stream-key")
            .unwrap();
        orchestrator.stop().unwrap();
        orchestrator.deinitiate();
        settle(&engine, &mut orchestrator);

        assert!(!orchestrator.is_initialized());
        assert_eq!(engine.live_source_count(), 0);
        assert_eq!(engine.live_sessions(), 0);
    }

    #[test]
    fn test_deinitiate_stops_transmission() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        orchestrator
            .start("rtmps://ingest.example.com/app", "key")
            .unwrap();
        engine.clear_calls();
        orchestrator.deinitiate();

        assert!(engine.calls().contains(&EngineCall::Stop));
        assert_eq!(orchestrator.session_state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_audio_session_strategy_is_pinned_by_live_sessions() {
        let engine = FakeEngine::with_default_devices();
        let registry = Arc::new(AudioSessionRegistry::new());
        let audio = |strategy: &str| AudioOptions {
            audio_session_strategy: Some(strategy.to_string()),
            ..Default::default()
        };

        let mut first = orchestrator(&engine).with_audio_sessions(Arc::clone(&registry));
        first.set_audio_config(audio("recordOnly")).unwrap();
        first.initiate().unwrap();
        assert_eq!(registry.strategy(), AudioSessionStrategy::RecordOnly);
        assert!(engine
            .calls()
            .contains(&EngineCall::ApplyAudioSessionStrategy(
                AudioSessionStrategy::RecordOnly
            )));

        let mut second = orchestrator(&engine).with_audio_sessions(Arc::clone(&registry));
        second.set_audio_config(audio("playAndRecord")).unwrap();
        assert!(matches!(
            second.initiate(),
            Err(SessionError::Configuration(ConfigError::AudioSessionLocked { .. }))
        ));
        assert!(!second.is_initialized());

        first.deinitiate();
        second.initiate().unwrap();
        assert_eq!(registry.strategy(), AudioSessionStrategy::PlayAndRecord);
    }

    #[test]
    fn test_configuration_rejected_after_initiation() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = initiated(&engine);

        assert_eq!(
            orchestrator.set_configuration_preset("basicLandscape"),
            Err(SessionError::AlreadyInitialized)
        );
        assert_eq!(
            orchestrator.set_video_config(VideoOptions::default()),
            Err(SessionError::AlreadyInitialized)
        );
        assert_eq!(
            orchestrator.set_audio_config(AudioOptions::default()),
            Err(SessionError::AlreadyInitialized)
        );
        assert_eq!(
            orchestrator.set_log_level("debug"),
            Err(SessionError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_unknown_selectors_are_rejected() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        assert!(matches!(
            orchestrator.set_configuration_preset("cinematic"),
            Err(SessionError::Configuration(ConfigError::UnknownValue { .. }))
        ));
        assert!(matches!(
            orchestrator.set_log_level("verbose"),
            Err(SessionError::Configuration(_))
        ));
        assert!(matches!(
            orchestrator.set_camera_preview_aspect_mode("stretch"),
            Err(SessionError::Configuration(_))
        ));
        assert!(matches!(
            orchestrator.set_video_config(VideoOptions {
                width: Some(720),
                ..Default::default()
            }),
            Err(SessionError::Configuration(ConfigError::IncompleteSize))
        ));
    }

    #[test]
    fn test_session_log_level_staged_then_live() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        orchestrator.set_session_log_level("debug").unwrap();
        orchestrator.initiate().unwrap();
        assert!(engine
            .calls()
            .contains(&EngineCall::SetLogLevel(LogLevel::Debug)));

        orchestrator.set_session_log_level("warning").unwrap();
        assert_eq!(
            engine.calls().last(),
            Some(&EngineCall::SetLogLevel(LogLevel::Warning))
        );
    }

    #[test]
    fn test_preview_uses_staged_mode() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        let views = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&views);
        orchestrator
            .handlers()
            .set_preview_handler(move |view| recorded.lock().push(view));

        orchestrator.set_camera_preview_aspect_mode("fit").unwrap();
        orchestrator.set_is_camera_preview_mirrored(true);
        orchestrator.initiate().unwrap();
        settle(&engine, &mut orchestrator);

        {
            let views = views.lock();
            assert_eq!(views.len(), 1);
            assert_eq!(views[0].aspect, AspectMode::Fit);
            assert!(views[0].mirrored);
        }

        orchestrator.set_is_camera_preview_mirrored(false);
        settle(&engine, &mut orchestrator);
        assert!(!views.lock()[1].mirrored);
    }

    #[test]
    fn test_focus_requires_camera() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);
        let point = Point { x: 0.5, y: 0.25 };

        assert_eq!(orchestrator.focus(point), Err(SessionError::NotInitialized));

        orchestrator.initiate().unwrap();
        assert!(matches!(
            orchestrator.focus(point),
            Err(SessionError::NoDeviceAvailable(_))
        ));

        settle(&engine, &mut orchestrator);
        orchestrator.focus(point).unwrap();
        assert!(engine.calls().contains(&EngineCall::Focus {
            urn: BuiltInCamera::BackWide.urn().to_string(),
            point,
        }));
    }

    #[test]
    fn test_engine_errors_reach_registered_handler() {
        let engine = FakeEngine::with_default_devices();
        let mut orchestrator = orchestrator(&engine);

        let errors = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&errors);
        orchestrator
            .handlers()
            .set(EventKind::Error, move |event| recorded.lock().push(event));

        orchestrator.initiate().unwrap();
        engine.emit_error(EngineError::new(10, "Network", "Connection reset").fatal());

        let errors = errors.lock();
        match &errors[..] {
            [BroadcastEvent::Error(payload)] => {
                assert!(payload.is_fatal);
                assert_eq!(Some(payload.session_id.clone()), orchestrator.session_id());
            }
            other => panic!("unexpected events {:?}", other),
        }
    }
}
