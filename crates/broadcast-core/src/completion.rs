//! Engine completions marshaled onto the control thread.

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use broadcast_media::{
    DeviceCompletion, DeviceHandle, EngineError, ImageSourceHandle, SettledCallback,
    SourceCompletion,
};

use crate::slots::ResolvedOverlay;

/// Work deferred until the engine reports no device-list mutation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SettledTask {
    ApplyMute,
    RenderPreview,
}

/// The outcome of an asynchronous engine operation.
pub(crate) enum Completion {
    Camera(Result<DeviceHandle, EngineError>),
    Microphone(Result<DeviceHandle, EngineError>),
    DevicesSettled(SettledTask),
    SourceAttached {
        slot: String,
        source: ImageSourceHandle,
        result: Result<(), EngineError>,
    },
    SourceDetached {
        slot: String,
        source: ImageSourceHandle,
        result: Result<(), EngineError>,
    },
    OverlaysResolved {
        generation: u64,
        names: Vec<String>,
        overlays: Vec<ResolvedOverlay>,
    },
}

/// A completion tagged with the epoch of the session that issued it.
pub(crate) struct Stamped {
    pub epoch: u64,
    pub completion: Completion,
}

/// Unbounded: engine threads must never block on the control thread.
pub(crate) fn completion_channel() -> (Sender<Stamped>, Receiver<Stamped>) {
    crossbeam_channel::unbounded()
}

/// Builds engine callbacks that post back to the control thread.
#[derive(Clone)]
pub(crate) struct CompletionSink {
    epoch: u64,
    tx: Sender<Stamped>,
}

impl CompletionSink {
    pub fn new(epoch: u64, tx: Sender<Stamped>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn send(&self, completion: Completion) {
        let stamped = Stamped {
            epoch: self.epoch,
            completion,
        };
        if self.tx.send(stamped).is_err() {
            debug!(epoch = self.epoch, "Control loop gone, dropping completion");
        }
    }

    pub fn camera(&self) -> DeviceCompletion {
        let sink = self.clone();
        Box::new(move |result| sink.send(Completion::Camera(result)))
    }

    pub fn microphone(&self) -> DeviceCompletion {
        let sink = self.clone();
        Box::new(move |result| sink.send(Completion::Microphone(result)))
    }

    pub fn settled(&self, task: SettledTask) -> SettledCallback {
        let sink = self.clone();
        Box::new(move || sink.send(Completion::DevicesSettled(task)))
    }

    pub fn source_attached(&self, slot: &str, source: &ImageSourceHandle) -> SourceCompletion {
        let sink = self.clone();
        let slot = slot.to_string();
        let source = source.clone();
        Box::new(move |result| {
            sink.send(Completion::SourceAttached {
                slot,
                source,
                result,
            })
        })
    }

    pub fn source_detached(&self, slot: &str, source: &ImageSourceHandle) -> SourceCompletion {
        let sink = self.clone();
        let slot = slot.to_string();
        let source = source.clone();
        Box::new(move |result| {
            sink.send(Completion::SourceDetached {
                slot,
                source,
                result,
            })
        })
    }
}
