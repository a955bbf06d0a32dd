//! Host command handlers.
//!
//! Arguments arrive as JSON from the host's wire and failures go back as
//! plain messages.

use tracing::{debug, instrument};

use broadcast_ipc::{Point, StartOptions};

use crate::{HostBridge, HostError, NodeId};

fn message(error: HostError) -> String {
    error.to_string()
}

/// Start broadcasting from a node. `options` is a JSON [`StartOptions`].
#[instrument(skip(bridge, options))]
pub fn start(bridge: &HostBridge, node: NodeId, options: &str) -> Result<(), String> {
    debug!("start command");
    let options: StartOptions = serde_json::from_str(options)
        .map_err(HostError::from)
        .map_err(message)?;
    bridge.start(node, &options).map_err(message)
}

/// Stop broadcasting from a node.
#[instrument(skip(bridge))]
pub fn stop(bridge: &HostBridge, node: NodeId) -> Result<(), String> {
    debug!("stop command");
    bridge.stop(node).map_err(message)
}

/// Focus a node's camera. `point` is a JSON `{x, y}`.
#[instrument(skip(bridge))]
pub fn focus(bridge: &HostBridge, node: NodeId, point: &str) -> Result<(), String> {
    let point: Point = serde_json::from_str(point)
        .map_err(HostError::from)
        .map_err(message)?;
    bridge.focus(node, point).map_err(message)
}

/// Set a node's zoom ratio.
pub fn set_zoom(bridge: &HostBridge, node: NodeId, ratio: f64) -> Result<(), String> {
    let session = bridge.session(node).map_err(message)?;
    let target = session
        .set_zoom(ratio)
        .map_err(HostError::from)
        .map_err(message)?;
    debug!(node, camera = target.camera.name(), factor = target.factor, "Zoom set");
    Ok(())
}

/// Mute or unmute a node's audio.
pub fn set_is_muted(bridge: &HostBridge, node: NodeId, muted: bool) -> Result<(), String> {
    bridge
        .session(node)
        .map_err(message)?
        .set_is_muted(muted)
        .map_err(HostError::from)
        .map_err(message)
}

/// Poll for session events (non-blocking), as a JSON array.
pub fn poll_events(bridge: &HostBridge) -> Result<String, String> {
    let events = bridge.poll_events();
    serde_json::to_string(&events).map_err(|e| format!("Failed to encode events: {}", e))
}
