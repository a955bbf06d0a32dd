//! Overlay image slots in the outgoing mix.
//!
//! Each overlay name owns one mixer slot and at most one live image source.
//! A replacement source is only attached after the previous one has been
//! detached, so two sources are never bound to the same slot.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use broadcast_config::SlotDescriptor;
use broadcast_ipc::{OverlayEntry, Size};
use broadcast_media::{resolve_image, DecodedImage, EngineError, EngineSession, ImageLoader, ImageSourceHandle};

use crate::completion::CompletionSink;

/// An overlay entry whose image has been decoded.
#[derive(Debug, Clone)]
pub struct ResolvedOverlay {
    pub slot: SlotDescriptor,
    pub image: DecodedImage,
}

/// Decode every entry. Entries whose image cannot be resolved are skipped.
///
/// Blocks on file and network I/O.
pub fn resolve_overlays(loader: &dyn ImageLoader, entries: &[OverlayEntry]) -> Vec<ResolvedOverlay> {
    entries
        .iter()
        .filter_map(|entry| match resolve_image(loader, &entry.uri) {
            Ok(image) => {
                let size = entry.size.unwrap_or(Size {
                    width: image.width,
                    height: image.height,
                });
                let position = entry.position.unwrap_or_default();
                Some(ResolvedOverlay {
                    slot: SlotDescriptor::overlay(entry.name.clone(), size, position),
                    image,
                })
            }
            Err(e) => {
                warn!(name = %entry.name, uri = %entry.uri, "Skipping overlay: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Default)]
enum SourcePhase {
    #[default]
    Empty,
    Attaching {
        source: ImageSourceHandle,
        image: DecodedImage,
    },
    Bound {
        source: ImageSourceHandle,
    },
    Detaching {
        source: ImageSourceHandle,
    },
}

#[derive(Debug, Default)]
struct SlotBinding {
    phase: SourcePhase,
    /// Replacement waiting for the current source to detach.
    next: Option<ResolvedOverlay>,
    /// Remove the slot once its source is gone.
    remove: bool,
}

/// Overlay slot state of one live session.
pub(crate) struct MixerSlotManager {
    sink: CompletionSink,
    slots: HashMap<String, SlotBinding>,
    generation: u64,
}

impl MixerSlotManager {
    pub fn new(sink: CompletionSink) -> Self {
        Self {
            sink,
            slots: HashMap::new(),
            generation: 0,
        }
    }

    /// Start a new overlay resolution, superseding any in progress.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Source currently bound to a slot.
    pub fn bound_source(&self, name: &str) -> Option<&ImageSourceHandle> {
        match self.slots.get(name).map(|binding| &binding.phase) {
            Some(SourcePhase::Bound { source }) => Some(source),
            _ => None,
        }
    }

    /// Names of every slot with a source attached or in transition.
    pub fn slot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.keys().cloned().collect();
        names.sort();
        names
    }

    /// Apply a resolved overlay set. Slots missing from `names` are removed.
    pub fn apply(
        &mut self,
        session: &dyn EngineSession,
        generation: u64,
        names: &[String],
        overlays: Vec<ResolvedOverlay>,
    ) {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "Discarding superseded overlay resolution"
            );
            return;
        }

        let stale: Vec<String> = self
            .slots
            .keys()
            .filter(|name| !names.contains(name))
            .cloned()
            .collect();
        for name in stale {
            self.remove(session, &name);
        }

        for overlay in overlays {
            self.replace(session, overlay);
        }
    }

    fn replace(&mut self, session: &dyn EngineSession, overlay: ResolvedOverlay) {
        let name = overlay.slot.name.clone();
        let binding = self.slots.entry(name.clone()).or_default();
        binding.remove = false;

        match std::mem::take(&mut binding.phase) {
            SourcePhase::Empty => {
                if !attach(session, &self.sink, binding, overlay) {
                    self.slots.remove(&name);
                }
            }
            SourcePhase::Bound { source } => {
                binding.next = Some(overlay);
                detach(session, &self.sink, binding, &name, source);
            }
            phase @ (SourcePhase::Attaching { .. } | SourcePhase::Detaching { .. }) => {
                debug!(slot = %name, "Slot busy, queueing replacement");
                binding.phase = phase;
                binding.next = Some(overlay);
            }
        }
    }

    fn remove(&mut self, session: &dyn EngineSession, name: &str) {
        let Some(binding) = self.slots.get_mut(name) else {
            return;
        };
        binding.remove = true;
        binding.next = None;

        match std::mem::take(&mut binding.phase) {
            SourcePhase::Empty => {
                self.slots.remove(name);
                remove_mixer_slot(session, name);
            }
            SourcePhase::Bound { source } => detach(session, &self.sink, binding, name, source),
            phase => binding.phase = phase,
        }
    }

    /// Handle the completion of a source attach.
    pub fn source_attached(
        &mut self,
        session: &dyn EngineSession,
        name: &str,
        attached: ImageSourceHandle,
        result: Result<(), EngineError>,
    ) {
        let Some(binding) = self.slots.get_mut(name) else {
            warn!(slot = %name, "Attach completion for an unknown slot");
            return;
        };

        let (source, image) = match std::mem::take(&mut binding.phase) {
            SourcePhase::Attaching { source, image } if source == attached => (source, image),
            phase => {
                warn!(slot = %name, "Unexpected attach completion");
                binding.phase = phase;
                return;
            }
        };

        if let Err(e) = result {
            error!(slot = %name, "Overlay source attach failed: {}", e);
            self.settle_empty(session, name);
            return;
        }

        if binding.next.is_some() || binding.remove {
            detach(session, &self.sink, binding, name, source);
            return;
        }

        if let Err(e) = session.submit_image(&source, &image) {
            error!(slot = %name, "Failed to submit overlay image: {}", e);
        }
        debug!(slot = %name, source = source.id(), "Overlay bound");
        binding.phase = SourcePhase::Bound { source };
    }

    /// Handle the completion of a source detach.
    pub fn source_detached(
        &mut self,
        session: &dyn EngineSession,
        name: &str,
        detached: ImageSourceHandle,
        result: Result<(), EngineError>,
    ) {
        let Some(binding) = self.slots.get_mut(name) else {
            warn!(slot = %name, "Detach completion for an unknown slot");
            return;
        };

        let source = match std::mem::take(&mut binding.phase) {
            SourcePhase::Detaching { source } if source == detached => source,
            phase => {
                warn!(slot = %name, "Unexpected detach completion");
                binding.phase = phase;
                return;
            }
        };

        match result {
            Ok(()) => {
                debug!(slot = %name, source = source.id(), "Overlay source detached");
                self.settle_empty(session, name);
            }
            Err(e) => {
                error!(slot = %name, "Overlay source detach failed, keeping it: {}", e);
                binding.next = None;
                binding.remove = false;
                binding.phase = SourcePhase::Bound { source };
            }
        }
    }

    /// Attach the queued replacement, or drop the slot if none is queued.
    fn settle_empty(&mut self, session: &dyn EngineSession, name: &str) {
        let next = self
            .slots
            .get_mut(name)
            .and_then(|binding| binding.next.take());

        let attached = match (next, self.slots.get_mut(name)) {
            (Some(overlay), Some(binding)) => attach(session, &self.sink, binding, overlay),
            _ => false,
        };

        if !attached {
            self.slots.remove(name);
            remove_mixer_slot(session, name);
        }
    }

    /// Detach every source. Called when the session is torn down.
    pub fn release_all(&mut self, session: &dyn EngineSession) {
        for (name, binding) in self.slots.drain() {
            match binding.phase {
                SourcePhase::Attaching { source, .. } | SourcePhase::Bound { source } => {
                    debug!(slot = %name, source = source.id(), "Releasing overlay source");
                    session.detach_image_source(&source, self.sink.source_detached(&name, &source));
                }
                SourcePhase::Detaching { .. } | SourcePhase::Empty => {}
            }
        }
    }
}

/// Add the slot and start attaching a fresh source to it. Returns false if
/// the engine rejected the slot.
fn attach(
    session: &dyn EngineSession,
    sink: &CompletionSink,
    binding: &mut SlotBinding,
    overlay: ResolvedOverlay,
) -> bool {
    let name = overlay.slot.name.as_str();
    if let Err(e) = session.add_mixer_slot(&overlay.slot) {
        error!(slot = %name, "Failed to add overlay slot: {}", e);
        return false;
    }

    let source = session.create_image_source(name);
    debug!(slot = %name, source = source.id(), "Attaching overlay source");
    session.attach_image_source(&source, name, sink.source_attached(name, &source));
    binding.phase = SourcePhase::Attaching {
        source,
        image: overlay.image,
    };
    true
}

fn detach(
    session: &dyn EngineSession,
    sink: &CompletionSink,
    binding: &mut SlotBinding,
    name: &str,
    source: ImageSourceHandle,
) {
    debug!(slot = %name, source = source.id(), "Detaching overlay source");
    session.detach_image_source(&source, sink.source_detached(name, &source));
    binding.phase = SourcePhase::Detaching { source };
}

fn remove_mixer_slot(session: &dyn EngineSession, name: &str) {
    if let Err(e) = session.remove_mixer_slot(name) {
        error!(slot = %name, "Failed to remove overlay slot: {}", e);
    }
}
