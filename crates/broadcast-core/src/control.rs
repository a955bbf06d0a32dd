//! The session control loop.
//!
//! One thread owns the [`Orchestrator`]. Host requests and engine
//! completions both arrive over channels and are handled there one at a
//! time, so the session, its device map and its slot map are never touched
//! concurrently.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use broadcast_config::AudioSessionRegistry;
use broadcast_ipc::{
    command_channel, AudioOptions, BroadcastEvent, EventKind, OverlayEntry, Point, SessionCommand,
    SessionState, VideoOptions,
};
use broadcast_media::{BroadcastEngine, ImageLoader, PreviewView};

use crate::bridge::EventHandlers;
use crate::devices::ZoomTarget;
use crate::error::SessionError;
use crate::orchestrator::Orchestrator;
use crate::SessionResult;

/// Result of a command handled on the control thread.
#[derive(Debug, Clone, PartialEq)]
enum Reply {
    Done,
    Flag(bool),
    Zoom(ZoomTarget),
}

struct Request {
    command: SessionCommand,
    reply: Sender<SessionResult<Reply>>,
}

/// Name of the thread that owns a session.
pub const CONTROL_THREAD_NAME: &str = "session-control";

/// Run a session on its own control thread, using the process-wide audio
/// session registry.
pub fn spawn_session(
    engine: Arc<dyn BroadcastEngine>,
    loader: Arc<dyn ImageLoader>,
) -> SessionResult<SessionHandle> {
    spawn_session_with(engine, loader, AudioSessionRegistry::global())
}

/// Run a session on its own control thread.
pub fn spawn_session_with(
    engine: Arc<dyn BroadcastEngine>,
    loader: Arc<dyn ImageLoader>,
    audio_sessions: Arc<AudioSessionRegistry>,
) -> SessionResult<SessionHandle> {
    let (command_tx, command_rx) = command_channel();
    let handlers = Arc::new(EventHandlers::new());
    let state = Arc::new(RwLock::new(SessionState::default()));

    let thread = {
        let handlers = Arc::clone(&handlers);
        let state = Arc::clone(&state);
        thread::Builder::new()
            .name(CONTROL_THREAD_NAME.to_string())
            .spawn(move || {
                let orchestrator =
                    Orchestrator::with_shared(engine, loader, handlers, state, audio_sessions);
                run(orchestrator, command_rx);
            })
            .map_err(|e| SessionError::ThreadSpawn(e.to_string()))?
    };

    Ok(SessionHandle {
        commands: command_tx,
        handlers,
        state,
        thread: Arc::new(Mutex::new(Some(thread))),
    })
}

#[instrument(name = "session_control_loop", skip_all)]
fn run(mut orchestrator: Orchestrator, commands: Receiver<Request>) {
    info!("Session control loop starting");
    let completions = orchestrator.completions();

    loop {
        select! {
            recv(commands) -> request => match request {
                Ok(request) => {
                    // Completions posted before the command take effect first.
                    orchestrator.process_pending();
                    if !handle_request(&mut orchestrator, request) {
                        break;
                    }
                }
                Err(_) => {
                    info!("Command channel disconnected, shutting down");
                    break;
                }
            },
            recv(completions) -> stamped => {
                if let Ok(stamped) = stamped {
                    orchestrator.handle_completion(stamped);
                }
            }
        }
    }

    orchestrator.deinitiate();
    info!("Session control loop stopped");
}

/// Handle a request. Returns false if the loop should stop.
fn handle_request(orchestrator: &mut Orchestrator, request: Request) -> bool {
    let Request { command, reply } = request;
    debug!(?command, "Handling command");

    let shutdown = matches!(command, SessionCommand::Shutdown);
    let result = execute(orchestrator, command);

    if reply.send(result).is_err() {
        debug!("Requester went away before the reply");
    }

    !shutdown
}

fn execute(orchestrator: &mut Orchestrator, command: SessionCommand) -> SessionResult<Reply> {
    match command {
        SessionCommand::Initiate => orchestrator.initiate().map(|()| Reply::Done),
        SessionCommand::Deinitiate | SessionCommand::Shutdown => {
            orchestrator.deinitiate();
            Ok(Reply::Done)
        }
        SessionCommand::IsInitialized => Ok(Reply::Flag(orchestrator.is_initialized())),
        SessionCommand::IsReady => Ok(Reply::Flag(orchestrator.is_ready())),
        SessionCommand::Start { url, stream_key } => {
            orchestrator.start(&url, &stream_key).map(|()| Reply::Done)
        }
        SessionCommand::Stop => orchestrator.stop().map(|()| Reply::Done),
        SessionCommand::SetZoom(ratio) => orchestrator.set_zoom(ratio).map(Reply::Zoom),
        SessionCommand::SetIsMuted(muted) => {
            orchestrator.set_is_muted(muted);
            Ok(Reply::Done)
        }
        SessionCommand::SetSessionLogLevel(name) => orchestrator
            .set_session_log_level(&name)
            .map(|()| Reply::Done),
        SessionCommand::SetLogLevel(name) => orchestrator.set_log_level(&name).map(|()| Reply::Done),
        SessionCommand::SetConfigurationPreset(name) => orchestrator
            .set_configuration_preset(&name)
            .map(|()| Reply::Done),
        SessionCommand::SetVideoConfig(options) => orchestrator
            .set_video_config(options)
            .map(|()| Reply::Done),
        SessionCommand::SetAudioConfig(options) => orchestrator
            .set_audio_config(options)
            .map(|()| Reply::Done),
        SessionCommand::SetOverlayConfig(entries) => {
            orchestrator.set_overlay_config(entries);
            Ok(Reply::Done)
        }
        SessionCommand::SetCameraPreviewAspectMode(name) => orchestrator
            .set_camera_preview_aspect_mode(&name)
            .map(|()| Reply::Done),
        SessionCommand::SetIsCameraPreviewMirrored(mirrored) => {
            orchestrator.set_is_camera_preview_mirrored(mirrored);
            Ok(Reply::Done)
        }
        SessionCommand::Focus(point) => orchestrator.focus(point).map(|()| Reply::Done),
    }
}

/// Cloneable handle to a session running on its control thread.
///
/// Every operation blocks until the control thread has handled it. When the
/// last handle is dropped the session is torn down and the thread exits.
#[derive(Clone)]
pub struct SessionHandle {
    commands: Sender<Request>,
    handlers: Arc<EventHandlers>,
    state: Arc<RwLock<SessionState>>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionHandle {
    fn request(&self, command: SessionCommand) -> SessionResult<Reply> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(Request {
                command,
                reply: reply_tx,
            })
            .map_err(|_| SessionError::ControlLoopClosed)?;
        reply_rx.recv().map_err(|_| SessionError::ControlLoopClosed)?
    }

    fn done(&self, command: SessionCommand) -> SessionResult<()> {
        self.request(command).map(|_| ())
    }

    fn flag(&self, command: SessionCommand) -> SessionResult<bool> {
        match self.request(command)? {
            Reply::Flag(value) => Ok(value),
            other => {
                warn!(?other, "Unexpected reply to a query");
                Ok(false)
            }
        }
    }

    pub fn initiate(&self) -> SessionResult<()> {
        self.done(SessionCommand::Initiate)
    }

    pub fn deinitiate(&self) -> SessionResult<()> {
        self.done(SessionCommand::Deinitiate)
    }

    pub fn is_initialized(&self) -> SessionResult<bool> {
        self.flag(SessionCommand::IsInitialized)
    }

    pub fn is_ready(&self) -> SessionResult<bool> {
        self.flag(SessionCommand::IsReady)
    }

    pub fn start(&self, url: &str, stream_key: &str) -> SessionResult<()> {
        self.done(SessionCommand::Start {
            url: url.to_string(),
            stream_key: stream_key.to_string(),
        })
    }

    pub fn stop(&self) -> SessionResult<()> {
        self.done(SessionCommand::Stop)
    }

    /// Set the zoom ratio. Returns the camera and factor it mapped to.
    pub fn set_zoom(&self, ratio: f64) -> SessionResult<ZoomTarget> {
        match self.request(SessionCommand::SetZoom(ratio))? {
            Reply::Zoom(target) => Ok(target),
            other => {
                warn!(?other, "Unexpected reply to a zoom request");
                Err(SessionError::InvalidZoom(ratio))
            }
        }
    }

    pub fn set_is_muted(&self, muted: bool) -> SessionResult<()> {
        self.done(SessionCommand::SetIsMuted(muted))
    }

    pub fn set_session_log_level(&self, name: &str) -> SessionResult<()> {
        self.done(SessionCommand::SetSessionLogLevel(name.to_string()))
    }

    pub fn set_log_level(&self, name: &str) -> SessionResult<()> {
        self.done(SessionCommand::SetLogLevel(name.to_string()))
    }

    pub fn set_configuration_preset(&self, name: &str) -> SessionResult<()> {
        self.done(SessionCommand::SetConfigurationPreset(name.to_string()))
    }

    pub fn set_video_config(&self, options: VideoOptions) -> SessionResult<()> {
        self.done(SessionCommand::SetVideoConfig(options))
    }

    pub fn set_audio_config(&self, options: AudioOptions) -> SessionResult<()> {
        self.done(SessionCommand::SetAudioConfig(options))
    }

    pub fn set_overlay_config(&self, entries: Vec<OverlayEntry>) -> SessionResult<()> {
        self.done(SessionCommand::SetOverlayConfig(entries))
    }

    pub fn set_camera_preview_aspect_mode(&self, name: &str) -> SessionResult<()> {
        self.done(SessionCommand::SetCameraPreviewAspectMode(name.to_string()))
    }

    pub fn set_is_camera_preview_mirrored(&self, mirrored: bool) -> SessionResult<()> {
        self.done(SessionCommand::SetIsCameraPreviewMirrored(mirrored))
    }

    pub fn focus(&self, point: Point) -> SessionResult<()> {
        self.done(SessionCommand::Focus(point))
    }

    /// Register the handler for an event kind. Takes effect immediately.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(BroadcastEvent) + Send + Sync + 'static,
    {
        self.handlers.set(kind, handler);
    }

    pub fn on_preview<F>(&self, handler: F)
    where
        F: Fn(PreviewView) + Send + Sync + 'static,
    {
        self.handlers.set_preview_handler(handler);
    }

    pub fn handlers(&self) -> &Arc<EventHandlers> {
        &self.handlers
    }

    /// Last state reported by the engine.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Tear the session down and wait for the control thread to exit.
    pub fn shutdown(&self) -> SessionResult<()> {
        let result = self.done(SessionCommand::Shutdown);
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("Session control thread panicked");
            }
        }
        result
    }
}
