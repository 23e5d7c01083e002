// src/monitor_stream.rs
//
// Operator-facing preview worker. Pulls frames from its own camera (or
// the synthetic scene), prefers a fresher annotated frame pushed by the
// detection loop, stamps the HUD on top and publishes the JPEG into the
// monitor slot at ~40Hz.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use tracing::{debug, info, warn};

use crate::annotate::{
    decode_image, draw_circle, draw_hline, draw_label, encode_jpeg, fill_circle, fill_rect,
    label_width,
};
use crate::config::Config;
use crate::context::{MonitorContext, SharedFrame};
use crate::frame_source::open_local_camera;
use crate::synthetic::demo_scene;
use crate::types::LightState;

const MONITOR_JPEG_QUALITY: u8 = 85;
/// Stale buffered frames discarded right after opening the camera.
const STARTUP_FLUSH: usize = 5;
const FRAME_DELAY: Duration = Duration::from_millis(25);
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);
const FPS_WINDOW: Duration = Duration::from_secs(2);

const HUD_BAR: Rgb<u8> = Rgb([18, 8, 4]);
const HUD_TIMESTAMP: Rgb<u8> = Rgb([255, 220, 180]);
const HUD_PHASE_TEXT: Rgb<u8> = Rgb([255, 230, 200]);
const HUD_STATS: Rgb<u8> = Rgb([255, 200, 160]);
const HUD_MODE_LIVE: Rgb<u8> = Rgb([80, 200, 0]);
const HUD_MODE_DEMO: Rgb<u8> = Rgb([220, 120, 0]);

pub async fn run_monitor_stream(ctx: Arc<MonitorContext>, config: Config) {
    info!("🎥 Monitor stream worker starting...");
    let mut camera = open_local_camera(&config.monitor.frames_dir);
    let (width, height) = (config.monitor.width, config.monitor.height);
    let max_vehicles = config.detection.max_vehicles;

    match camera.as_mut() {
        Some(cam) => {
            for _ in 0..STARTUP_FLUSH {
                cam.flush();
            }
            // First frame up front so the stream never starts blank.
            if let Some(mut first) = cam.read_frame() {
                info!("✅ Monitor camera opened: {}x{}", first.width(), first.height());
                draw_hud(&mut first, &ctx, true, max_vehicles);
                if let Some(jpeg) = encode_jpeg(&first, MONITOR_JPEG_QUALITY) {
                    ctx.monitor_out.publish(jpeg);
                }
            }
        }
        None => warn!("⚠️  Monitor camera not available, streaming demo frames"),
    }

    let started = Instant::now();
    let mut fps_started = Instant::now();
    let mut fps_count: u32 = 0;

    while !ctx.should_stop() {
        let capture_started = Instant::now();

        let own = match camera.as_mut() {
            Some(cam) => {
                // Discard one buffered frame so the preview stays current.
                cam.flush();
                match cam.read_frame() {
                    Some(frame) => frame,
                    None => {
                        debug!("Monitor camera read failed, retrying");
                        tokio::time::sleep(READ_RETRY_DELAY).await;
                        continue;
                    }
                }
            }
            None => demo_scene(width, height, started.elapsed().as_secs_f64()),
        };

        let mut image = select_base(own, ctx.handoff.latest(), capture_started);
        draw_hud(&mut image, &ctx, camera.is_some(), max_vehicles);

        if let Some(jpeg) = encode_jpeg(&image, MONITOR_JPEG_QUALITY) {
            ctx.monitor_out.publish(jpeg);
        }

        fps_count += 1;
        let window = fps_started.elapsed();
        if window >= FPS_WINDOW {
            let fps = fps_count as f32 / window.as_secs_f32();
            ctx.counters.set_display_fps(fps);
            debug!("Monitor stream fps {:.1}", fps);
            fps_started = Instant::now();
            fps_count = 0;
        }

        tokio::time::sleep(FRAME_DELAY).await;
    }

    info!("🛑 Monitor stream worker stopped");
}

/// Annotated frames from the detection loop replace the worker's own
/// capture when they are at least as recent as this iteration's start.
fn select_base(own: RgbImage, pushed: Option<SharedFrame>, capture_started: Instant) -> RgbImage {
    if let Some(pushed) = pushed {
        if pushed.at >= capture_started {
            if let Some(decoded) = decode_image(&pushed.jpeg) {
                return decoded;
            }
        }
    }
    own
}

/// Status overlay drawn over every published frame: dark top bar with
/// wall clock, phase lamp and countdown, the stop line guide, dark
/// bottom bar with source/AI/camera mode and fps / vehicle stats.
fn draw_hud(image: &mut RgbImage, ctx: &MonitorContext, camera_ok: bool, max_vehicles: usize) {
    let w = image.width() as i32;
    let h = image.height() as i32;
    let status = ctx.light.status();
    let display = ctx.display();

    fill_rect(image, 0, 0, w - 1, 33, HUD_BAR);
    let clock = chrono::Local::now().format("%H:%M:%S  %d/%m/%Y").to_string();
    draw_label(image, 10, 10, &clock, HUD_TIMESTAMP, 2);

    fill_circle(image, w - 22, 17, 11, lamp_color(status.phase));
    draw_circle(image, w - 22, 17, 11, Rgb([255, 255, 255]));
    let phase_text = match status.countdown {
        Some(n) => format!("{} {}s", status.phase.as_str(), n),
        None => status.phase.as_str().to_string(),
    };
    draw_label(image, w - 195, 10, &phase_text, HUD_PHASE_TEXT, 2);

    let line_y = (h as f32 * 0.72) as i32;
    let line_color = stop_line_color(status.phase);
    draw_hline(
        image,
        (w as f32 * 0.04) as i32,
        (w as f32 * 0.96) as i32,
        line_y,
        line_color,
        2,
    );
    draw_label(
        image,
        (w as f32 * 0.30) as i32,
        line_y - 10,
        "STOP LINE - ROI",
        line_color,
        1,
    );

    fill_rect(image, 0, h - 30, w - 1, h - 1, HUD_BAR);
    let live = ctx.remote.seen_remote();
    let mode = format!(
        "{} | AI:{} | CAM:{}",
        if live { "REMOTE-LIVE" } else { "DEMO" },
        if display.detector_live { "LIVE" } else { "DEMO" },
        if camera_ok { "OK" } else { "OFF" },
    );
    let mode_color = if live { HUD_MODE_LIVE } else { HUD_MODE_DEMO };
    draw_label(image, 8, h - 22, &mode, mode_color, 2);

    let stats = format!(
        "FPS:{:.0}  VEH:{}/{}",
        ctx.counters.display_fps(),
        display.vehicles_frame,
        max_vehicles,
    );
    draw_label(image, w - label_width(&stats, 2) - 8, h - 22, &stats, HUD_STATS, 2);
}

fn lamp_color(phase: LightState) -> Rgb<u8> {
    match phase {
        LightState::Red => Rgb([220, 0, 0]),
        LightState::Yellow => Rgb([220, 190, 0]),
        LightState::Green => Rgb([60, 200, 0]),
    }
}

fn stop_line_color(phase: LightState) -> Rgb<u8> {
    match phase {
        LightState::Red => Rgb([220, 50, 50]),
        LightState::Yellow => Rgb([200, 150, 50]),
        LightState::Green => Rgb([50, 180, 50]),
    }
}
