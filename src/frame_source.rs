// src/frame_source.rs
//
// Local camera abstraction plus the per-tick frame source arbiter:
// fresh remote frame, else local camera, else synthetic scene.

use crate::annotate::decode_image;
use crate::ingest::RemoteFrameState;
use crate::metrics::PerfCounters;
use crate::synthetic::demo_scene;
use crate::types::{Frame, FrameOrigin};
use anyhow::{bail, Result};
use image::RgbImage;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Remote frames older than this are ignored by the arbiter.
pub const REMOTE_FRESH_WINDOW: Duration = Duration::from_secs(2);

pub trait CameraSource: Send {
    fn read_frame(&mut self) -> Option<RgbImage>;

    /// Discard one buffered stale frame. Default no-op for sources
    /// without device buffering.
    fn flush(&mut self) {}
}

/// Frame sequence played from a directory of images, looping. Stands
/// in for a capture device handle.
pub struct DirectoryCamera {
    frames: Vec<PathBuf>,
    next: usize,
}

impl DirectoryCamera {
    pub fn open(dir: &str) -> Result<Self> {
        let mut frames: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                matches!(
                    path.extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| ext.to_ascii_lowercase())
                        .as_deref(),
                    Some("jpg" | "jpeg" | "png")
                )
            })
            .collect();
        frames.sort();
        if frames.is_empty() {
            bail!("No image frames under {}", dir);
        }
        info!("🎥 Local camera opened: {} frames from {}", frames.len(), dir);
        Ok(Self { frames, next: 0 })
    }
}

impl CameraSource for DirectoryCamera {
    fn read_frame(&mut self) -> Option<RgbImage> {
        for _ in 0..self.frames.len() {
            let path = self.frames[self.next].clone();
            self.next = (self.next + 1) % self.frames.len();
            match image::open(&path) {
                Ok(img) => return Some(img.to_rgb8()),
                Err(e) => debug!("Skipping unreadable frame {:?}: {}", path, e),
            }
        }
        None
    }

    fn flush(&mut self) {
        if !self.frames.is_empty() {
            self.next = (self.next + 1) % self.frames.len();
        }
    }
}

/// Opens the configured local camera once at startup. A failure here
/// is permanent for the process lifetime; the arbiter degrades to
/// synthetic frames instead.
pub fn open_local_camera(frames_dir: &str) -> Option<Box<dyn CameraSource>> {
    if frames_dir.is_empty() {
        return None;
    }
    match DirectoryCamera::open(frames_dir) {
        Ok(camera) => Some(Box::new(camera)),
        Err(e) => {
            warn!("⚠️  Cannot open local camera: {:#}", e);
            warn!("    Using synthetic frames until a remote camera connects (normal behavior)");
            None
        }
    }
}

/// Per-tick source decision. Priority:
/// 1. remote frame fresher than 2s (decode failure falls through)
/// 2. local camera read
/// 3. animated synthetic scene
pub struct FrameArbiter {
    camera: Option<Box<dyn CameraSource>>,
    synthetic_size: (u32, u32),
    started_at: Instant,
}

impl FrameArbiter {
    pub fn new(camera: Option<Box<dyn CameraSource>>, synthetic_size: (u32, u32)) -> Self {
        Self {
            camera,
            synthetic_size,
            started_at: Instant::now(),
        }
    }

    pub fn next_frame(&mut self, remote: &RemoteFrameState, counters: &PerfCounters) -> Frame {
        if let Some(remote_frame) = remote.latest() {
            if remote_frame.received_at.elapsed() < REMOTE_FRESH_WINDOW {
                if let Some(image) = decode_image(&remote_frame.bytes) {
                    // Remote frames were already counted at ingest.
                    counters.inc(&counters.total_frames);
                    return Frame {
                        image,
                        origin: FrameOrigin::Remote,
                    };
                }
            }
        }

        if let Some(camera) = self.camera.as_mut() {
            if let Some(image) = camera.read_frame() {
                counters.inc(&counters.local_frames);
                counters.inc(&counters.total_frames);
                return Frame {
                    image,
                    origin: FrameOrigin::Local,
                };
            }
        }

        let t = self.started_at.elapsed().as_secs_f64();
        let image = demo_scene(self.synthetic_size.0, self.synthetic_size.1, t);
        counters.inc(&counters.synthetic_frames);
        counters.inc(&counters.total_frames);
        Frame {
            image,
            origin: FrameOrigin::Synthetic,
        }
    }
}
