//! Runs one broadcast against the in-memory engine and prints the events
//! the host would receive.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use tracing::info;

use broadcast_core::{spawn_session, SessionHandle};
use broadcast_host::{commands, init_logging, HostBridge, NodeId};
use broadcast_ipc::{AudioStats, BroadcastQuality, NetworkHealth, OverlayEntry, TransmissionStats};
use broadcast_media::fake::FakeEngine;
use broadcast_media::DefaultImageLoader;

const NODE: NodeId = 1;

const START_OPTIONS: &str = r#"{
    "rtmpsUrl": "rtmps://ingest.example.com:443/app/",
    "streamKey": "demo-stream-key"
}"#;

/// Release queued engine work until the control loop issues no more.
fn settle(engine: &FakeEngine, session: &SessionHandle) -> anyhow::Result<()> {
    loop {
        session.is_initialized()?;
        if engine.complete_all() == 0 {
            return Ok(());
        }
    }
}

/// Wait for the overlay resolver to hand a slot to the engine.
fn wait_for_overlay(engine: &FakeEngine, session: &SessionHandle, name: &str) -> anyhow::Result<()> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.live_sources(name).is_empty() {
        if Instant::now() > deadline {
            bail!("overlay {} was never bound", name);
        }
        thread::sleep(Duration::from_millis(10));
        settle(engine, session)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let overlay_dir = tempfile::tempdir().context("creating overlay directory")?;
    let logo = overlay_dir.path().join("logo.png");
    image::RgbaImage::from_pixel(160, 48, image::Rgba([255, 255, 255, 200]))
        .save(&logo)
        .context("writing overlay image")?;

    let engine = FakeEngine::with_default_devices();
    let session = spawn_session(Arc::new(engine.clone()), Arc::new(DefaultImageLoader::new()))?;
    let bridge = HostBridge::new();
    bridge.register(NODE, session.clone());

    session.set_configuration_preset("standardPortrait")?;
    session.set_video_config(serde_json::from_value(serde_json::json!({
        "bitrate": 2_000_000
    }))?)?;
    session.initiate()?;
    settle(&engine, &session)?;

    session.set_overlay_config(vec![OverlayEntry {
        name: "logo".to_string(),
        uri: logo.to_string_lossy().into_owned(),
        size: None,
        position: None,
    }])?;
    wait_for_overlay(&engine, &session, "logo")?;

    let target = session.set_zoom(0.7)?;
    settle(&engine, &session)?;
    info!(camera = target.camera.name(), factor = target.factor, "Zoom applied");

    commands::start(&bridge, NODE, START_OPTIONS).map_err(|e| anyhow!(e))?;

    engine.emit_transmission_statistics(TransmissionStats {
        rtt: 42.0,
        measured_bitrate: 1_950_000.0,
        recommended_bitrate: 2_000_000.0,
        network_health: NetworkHealth::Excellent,
        broadcast_quality: BroadcastQuality::High,
    });
    engine.emit_network_health(0.95);
    engine.emit_broadcast_quality(0.8);
    engine.emit_audio_stats(AudioStats {
        peak: -6.0,
        rms: -18.0,
    });

    commands::stop(&bridge, NODE).map_err(|e| anyhow!(e))?;
    session.deinitiate()?;
    settle(&engine, &session)?;

    let events = commands::poll_events(&bridge).map_err(|e| anyhow!(e))?;
    println!("{}", events);

    info!(
        live_sources = engine.live_source_count(),
        live_sessions = engine.live_sessions(),
        "Broadcast finished"
    );

    bridge.unregister(NODE)?.shutdown()?;
    Ok(())
}
