use bevy::prelude::*;
use bevy::render::view::screenshot::{Screenshot, ScreenshotCaptured};
use std::io::Cursor;

use crate::bridge::server::{CommandServer, Outcome};
use crate::components::{HeadlessMode, RunState, SceneNode};

/// Fixed localhost port for the runtime probe. Only ever bound in debug
/// builds — release binaries don't register the plugin.
pub const PROBE_PORT: u16 = 6551;

pub const PROBE_ENDPOINTS: &[&str] = &["ping", "stats", "screenshot"];

#[derive(Resource)]
pub struct ProbeServer(pub CommandServer);

/// The single allowed suspension point: a screenshot request parks its peer
/// until the render pass delivers the frame. While one is pending no other
/// probe request is processed.
#[derive(Resource, Default)]
pub struct PendingCapture {
    pub peer: Option<u64>,
    pub result: Option<Result<(Vec<u8>, u32, u32), String>>,
}

#[derive(Resource, Default)]
pub struct ProbeStats {
    pub frames: u64,
    pub started: Option<std::time::Instant>,
}

pub struct ProbePlugin;

impl Plugin for ProbePlugin {
    fn build(&self, app: &mut App) {
        match CommandServer::bind(PROBE_PORT) {
            Ok(server) => {
                println!("[Strata probe] Listening on http://127.0.0.1:{PROBE_PORT}");
                app.insert_resource(ProbeServer(server));
            }
            Err(e) => {
                eprintln!("[Strata probe] Failed to bind port {PROBE_PORT}: {e}");
                return;
            }
        }
        app.insert_resource(PendingCapture::default())
            .insert_resource(ProbeStats::default())
            .add_observer(capture_completed)
            .add_systems(Update, tick_probe);
    }
}

fn tick_probe(
    mut server: ResMut<ProbeServer>,
    mut pending: ResMut<PendingCapture>,
    mut stats: ResMut<ProbeStats>,
    headless: Res<HeadlessMode>,
    run_state: Res<RunState>,
    nodes: Query<&SceneNode>,
    mut commands: Commands,
) {
    stats.frames += 1;
    let started = *stats.started.get_or_insert_with(std::time::Instant::now);

    // Finish a suspended screenshot before anything else is considered.
    if let Some(peer) = pending.peer {
        if let Some(result) = pending.result.take() {
            let body = match result {
                Ok((png, width, height)) => serde_json::json!({
                    "format": "png",
                    "width": width,
                    "height": height,
                    "image_base64": base64_encode(&png),
                }),
                Err(e) => serde_json::json!({ "error": e }),
            };
            server.0.resolve_parked(peer, &body);
            pending.peer = None;
        }
    }

    let node_count = nodes.iter().count();
    let uptime = started.elapsed().as_secs_f64();
    let frames = stats.frames;
    let running = run_state.running;
    let windowed = !headless.0;

    let mut want_capture = false;
    server.0.poll(|request| match request.path.as_str() {
        "ping" => Outcome::Reply(serde_json::json!({
            "status": "ok",
            "probe": "strata",
            "version": env!("CARGO_PKG_VERSION"),
        })),
        "stats" => Outcome::Reply(serde_json::json!({
            "frames": frames,
            "uptime_seconds": uptime,
            "nodes": node_count,
            "running": running,
        })),
        "screenshot" => {
            if !windowed {
                Outcome::Reply(serde_json::json!({
                    "error": "Screenshot requires a window (running headless)",
                }))
            } else {
                want_capture = true;
                Outcome::Park
            }
        }
        other => Outcome::Reply(serde_json::json!({
            "error": format!("Unknown endpoint: {other}"),
            "endpoints": PROBE_ENDPOINTS,
        })),
    });

    if want_capture {
        pending.peer = server.0.parked_peer();
        pending.result = None;
        // The observer picks the frame up whenever the render pass finishes.
        commands.spawn(Screenshot::primary_window());
    }
}

/// Global observer for completed captures (registered once at startup).
fn capture_completed(
    trigger: Trigger<ScreenshotCaptured>,
    mut pending: ResMut<PendingCapture>,
) {
    if pending.peer.is_none() {
        return;
    }
    let frame = trigger.event().0.clone();
    pending.result = Some(match frame.try_into_dynamic() {
        Ok(dynamic) => {
            // hand the pixels over as raw bytes; the renderer's image types
            // are not the same crate version as ours
            let rgb = dynamic.to_rgb8();
            let (width, height) = rgb.dimensions();
            encode_png(width, height, rgb.into_raw()).map(|png| (png, width, height))
        }
        Err(e) => Err(format!("Frame conversion failed: {e:?}")),
    });
}

fn encode_png(width: u32, height: u32, raw_rgb: Vec<u8>) -> Result<Vec<u8>, String> {
    let buffer = image::RgbImage::from_raw(width, height, raw_rgb)
        .ok_or("Frame buffer size mismatch")?;
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(buffer)
        .write_to(&mut cursor, image::ImageOutputFormat::Png)
        .map_err(|e| format!("PNG encode failed: {e}"))?;
    Ok(cursor.into_inner())
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_catalog_is_stable() {
        assert!(PROBE_ENDPOINTS.contains(&"screenshot"));
        assert!(PROBE_ENDPOINTS.contains(&"ping"));
    }

    #[test]
    fn base64_matches_standard_alphabet() {
        assert_eq!(base64_encode(b"strata"), "c3RyYXRh");
        assert_eq!(base64_encode(b""), "");
    }

    #[test]
    fn encode_png_round_trips_dimensions() {
        let png = encode_png(2, 2, vec![200u8; 12]).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 2);
        assert_eq!(decoded.height(), 2);

        assert!(encode_png(2, 2, vec![0u8; 5]).is_err());
    }
}
