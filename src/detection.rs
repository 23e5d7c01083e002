// src/detection.rs
//
// Core enforcement loop. Life cycle: wait for the capability loader
// (bounded), then tick at ~30Hz until the stop flag flips. Each tick
// reads the mirrored phase, pulls one frame through the arbiter, runs
// the detector (or the demo fallback), annotates, and on RED feeds
// zone candidates to the violation pipeline behind a 500ms pass
// throttle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use image::Rgb;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::annotate::{
    box_color_for, draw_hline, draw_label, draw_rect, draw_vline, encode_jpeg, fill_rect,
    label_width,
};
use crate::capabilities::{Capabilities, DemoDetector, VehicleDetector};
use crate::config::Config;
use crate::context::MonitorContext;
use crate::frame_source::{CameraSource, FrameArbiter};
use crate::io::MonitorIo;
use crate::metrics::PerfCounters;
use crate::plate::PlateExtractor;
use crate::publish::{ViolationPipeline, REMOTE_CAM_ID, ROI_NAME};
use crate::throttle::PlateThrottle;
use crate::types::{ContextSnapshot, Detection, DisplayInfo, LightState};
use crate::zone::ViolationZone;

const IDLE_DELAY: Duration = Duration::from_millis(200);
const YIELD_DELAY: Duration = Duration::from_millis(20);
const TICK_DELAY: Duration = Duration::from_millis(30);
const ERROR_DELAY: Duration = Duration::from_millis(500);
const FPS_WINDOW: Duration = Duration::from_secs(3);

const HANDOFF_JPEG_QUALITY: u8 = 85;
const VIOLATION_HIGHLIGHT: Rgb<u8> = Rgb([255, 0, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// GREEN phase, nothing to analyze.
    Idle,
    /// Frame analyzed and pushed, violation pass still throttled.
    Throttled,
    /// Full pass, including violation processing under RED.
    Processed,
}

pub struct DetectionLoop {
    ctx: Arc<MonitorContext>,
    io: Arc<dyn MonitorIo>,
    arbiter: FrameArbiter,
    zone: ViolationZone,
    confidence_threshold: f32,
    max_vehicles: usize,
    capture_interval: Duration,
    detector: Option<Box<dyn VehicleDetector>>,
    demo: DemoDetector,
    pipeline: ViolationPipeline,
    last_pass: Option<Instant>,
    fps: FpsWindow,
}

impl DetectionLoop {
    pub fn new(
        ctx: Arc<MonitorContext>,
        io: Arc<dyn MonitorIo>,
        camera: Option<Box<dyn CameraSource>>,
        config: &Config,
        caps: Capabilities,
    ) -> Result<Self> {
        let pipeline = ViolationPipeline::new(
            caps.plate_reader,
            PlateExtractor::new()?,
            PlateThrottle::new(Duration::from_secs(config.detection.plate_throttle_secs)),
            ctx.clone(),
        );
        Ok(Self {
            arbiter: FrameArbiter::new(camera, (config.monitor.width, config.monitor.height)),
            zone: ViolationZone::from_config(&config.zone),
            confidence_threshold: config.detection.confidence_threshold,
            max_vehicles: config.detection.max_vehicles,
            capture_interval: Duration::from_millis(config.detection.capture_interval_ms),
            detector: caps.detector,
            demo: DemoDetector::new(),
            pipeline,
            last_pass: None,
            fps: FpsWindow::new(FPS_WINDOW),
            ctx,
            io,
        })
    }

    pub fn detector_available(&self) -> bool {
        self.detector.is_some()
    }

    /// One loop iteration. Contains no sleeps; the caller maps the
    /// outcome to a cadence.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome> {
        let status = self.io.read_light();

        // GREEN: no enforcement, keep the dashboards alive.
        if status.phase == LightState::Green {
            self.io
                .publish_context(&self.snapshot(LightState::Green, 0, 0.0));
            self.ctx.set_display(DisplayInfo {
                vehicles_frame: 0,
                detection_fps: 0.0,
                detector_live: self.detector.is_some(),
            });
            return Ok(TickOutcome::Idle);
        }

        let mut frame = self.arbiter.next_frame(&self.ctx.remote, &self.ctx.counters);
        let fps = self.fps.record(now, &self.ctx.counters);

        let detections = match self.detector.as_mut() {
            Some(detector) => {
                let found = detector.detect(&frame);
                self.ctx.counters.inc(&self.ctx.counters.detection_frames);
                found
            }
            None => self.demo.next_detections(frame.width(), frame.height()),
        };

        let (width, height) = (frame.width(), frame.height());
        let (zx1, zy1, zx2, zy2) = self.zone.pixel_rect(width, height);
        let box_color = box_color_for(status.phase);

        let mut vehicles = 0usize;
        let mut candidates: Vec<Detection> = Vec::new();
        {
            let img = &mut frame.image;
            for det in &detections {
                if !det.class.is_target() || det.confidence < self.confidence_threshold {
                    continue;
                }
                vehicles += 1;
                let b = det.bbox;
                draw_rect(img, b.x1, b.y1, b.x2, b.y2, box_color, 2);

                let label = format!("{} {:.0}%", det.class.label(), det.confidence * 100.0);
                let ly = (b.y1 - 12).max(2);
                fill_rect(img, b.x1, ly, b.x1 + label_width(&label, 1) + 4, ly + 9, box_color);
                draw_label(img, b.x1 + 2, ly + 1, &label, Rgb([0, 0, 0]), 1);

                if status.phase == LightState::Red && self.zone.contains(b.center(), width, height)
                {
                    draw_rect(
                        img,
                        b.x1 - 3,
                        b.y1 - 3,
                        b.x2 + 3,
                        b.y2 + 3,
                        VIOLATION_HIGHLIGHT,
                        3,
                    );
                    candidates.push(det.clone());
                }
            }

            let guide = zone_guide_color(status.phase);
            draw_hline(img, zx1, zx2, zy1, guide, 2);
            draw_vline(img, zx1, zy1, zy2, guide, 1);
            draw_vline(img, zx2, zy1, zy2, guide, 1);
            let zone_label = if status.phase == LightState::Red {
                "VIOLATION ZONE - STOP LINE"
            } else {
                "DETECTION ROI"
            };
            draw_label(img, zx1 + 10, zy1 - 20, zone_label, guide, 2);

            let (src_text, src_color) = if self.ctx.remote.seen_remote() {
                ("SOURCE: REMOTE-CAM", Rgb([100, 220, 0]))
            } else {
                ("SOURCE: WEBCAM/DEMO", Rgb([220, 120, 0]))
            };
            draw_label(img, zx1 + 10, zy1 + 8, src_text, src_color, 2);
        }

        let jpeg = encode_jpeg(&frame.image, HANDOFF_JPEG_QUALITY)
            .context("JPEG encode of the annotated frame failed")?;
        self.io.push_frame(jpeg);

        self.ctx.set_display(DisplayInfo {
            vehicles_frame: vehicles,
            detection_fps: fps,
            detector_live: self.detector.is_some(),
        });

        // Violation passes are rate-limited; frame analysis is not.
        if let Some(last) = self.last_pass {
            if now.duration_since(last) < self.capture_interval {
                self.io
                    .publish_context(&self.snapshot(status.phase, vehicles, fps));
                return Ok(TickOutcome::Throttled);
            }
        }

        if status.phase == LightState::Red && !candidates.is_empty() {
            self.last_pass = Some(now);
            for det in &candidates {
                self.pipeline
                    .process(&frame, det, vehicles, now, self.io.as_ref());
            }
        }

        self.io
            .publish_context(&self.snapshot(status.phase, vehicles, fps));
        Ok(TickOutcome::Processed)
    }

    fn snapshot(&self, phase: LightState, vehicles: usize, fps: f32) -> ContextSnapshot {
        ContextSnapshot {
            vehicles_frame: vehicles.min(self.max_vehicles),
            fps: f64::from((fps * 10.0).round() / 10.0),
            capture_interval: self.capture_interval.as_secs_f64(),
            roi: ROI_NAME.to_string(),
            target_objects: vec!["MOTORBIKE".to_string(), "CAR".to_string()],
            weather: "SUN".to_string(),
            distance: 5.0,
            light: phase.as_str().to_string(),
            ts: chrono::Utc::now().timestamp(),
            source: if self.ctx.remote.seen_remote() {
                REMOTE_CAM_ID.to_string()
            } else {
                "DEMO".to_string()
            },
        }
    }
}

fn zone_guide_color(phase: LightState) -> Rgb<u8> {
    match phase {
        LightState::Red => Rgb([220, 50, 50]),
        LightState::Yellow => Rgb([220, 200, 50]),
        LightState::Green => Rgb([50, 200, 50]),
    }
}

/// Rolling fps estimate; closes the window and stores the detection
/// fps once the span has elapsed.
struct FpsWindow {
    span: Duration,
    started: Option<Instant>,
    count: u32,
}

impl FpsWindow {
    fn new(span: Duration) -> Self {
        Self {
            span,
            started: None,
            count: 0,
        }
    }

    fn record(&mut self, now: Instant, counters: &PerfCounters) -> f32 {
        self.count += 1;
        let started = *self.started.get_or_insert(now);
        let elapsed = now.duration_since(started);
        let fps = if elapsed.is_zero() {
            0.0
        } else {
            self.count as f32 / elapsed.as_secs_f32()
        };
        if elapsed >= self.span {
            counters.set_detection_fps(fps);
            debug!("Detection fps {:.1} over the last {:.1}s", fps, elapsed.as_secs_f32());
            self.started = Some(now);
            self.count = 0;
        }
        fps
    }
}

/// Detection task entry point. Waits for capabilities (bounded), then
/// ticks until the stop flag flips. A load timeout aborts detection
/// permanently while the rest of the process keeps running.
pub async fn run_detection(
    ctx: Arc<MonitorContext>,
    io: Arc<dyn MonitorIo>,
    camera: Option<Box<dyn CameraSource>>,
    config: Config,
    caps_rx: oneshot::Receiver<Capabilities>,
) -> Result<()> {
    let wait = Duration::from_secs(config.detection.model_timeout_secs);
    info!(
        "⏳ Detection loop: waiting for capabilities (timeout={}s)...",
        wait.as_secs()
    );
    let caps = match tokio::time::timeout(wait, caps_rx).await {
        Ok(Ok(caps)) => caps,
        Ok(Err(_)) => {
            error!("❌ Capability loader went away, detection loop aborted");
            return Ok(());
        }
        Err(_) => {
            error!(
                "❌ Capabilities not ready after {}s, detection loop aborted",
                wait.as_secs()
            );
            return Ok(());
        }
    };

    let mut detection = DetectionLoop::new(ctx.clone(), io, camera, &config, caps)?;
    info!("🎯 Detection loop started");

    while !ctx.should_stop() {
        let delay = match detection.tick(tokio::time::Instant::now().into_std()) {
            Ok(TickOutcome::Idle) => IDLE_DELAY,
            Ok(TickOutcome::Throttled) => YIELD_DELAY,
            Ok(TickOutcome::Processed) => TICK_DELAY,
            Err(e) => {
                error!("Detection tick failed: {:#}", e);
                ERROR_DELAY
            }
        };
        tokio::time::sleep(delay).await;
    }

    let summary = ctx.counters.summary();
    info!(
        "🛑 Detection loop stopped | total_frames={} violations={}",
        summary.total_frames, summary.violations_found
    );
    Ok(())
}
