// src/capabilities.rs
//
// Pluggable detector/OCR capability providers. Both are total from
// the core's view: provider failures surface as empty output, and a
// missing provider is an explicit None the loop branches on.

use crate::types::{BoundingBox, Detection, Frame, PlateFragment, VehicleClass};
use image::RgbImage;
use tokio::sync::oneshot;
use tracing::info;

pub trait VehicleDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Vec<Detection>;
}

pub trait PlateReader: Send {
    fn read_text(&mut self, crop: &RgbImage) -> Vec<PlateFragment>;
}

/// Capability bundle handed to the detection loop once loading
/// finishes. Availability is an explicit flag, not an import probe.
#[derive(Default)]
pub struct Capabilities {
    pub detector: Option<Box<dyn VehicleDetector>>,
    pub plate_reader: Option<Box<dyn PlateReader>>,
}

impl Capabilities {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn detector_available(&self) -> bool {
        self.detector.is_some()
    }

    pub fn reader_available(&self) -> bool {
        self.plate_reader.is_some()
    }
}

pub type CapabilityFactory = Box<dyn FnOnce() -> Capabilities + Send>;

/// Runs the (potentially slow) capability construction off-thread.
/// The detection loop waits on the returned channel with its own
/// deadline.
pub fn spawn_capability_loader(factory: CapabilityFactory) -> oneshot::Receiver<Capabilities> {
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        info!("📦 Loading detection capabilities (background)...");
        let caps = factory();
        let state = |available: bool| if available { "✅ OK" } else { "❌ OFF" };
        info!("════════════════════════════════════════════════════════");
        info!(
            "🚀 Capabilities ready | detector={} | ocr={}",
            state(caps.detector_available()),
            state(caps.reader_available())
        );
        info!("════════════════════════════════════════════════════════");
        let _ = tx.send(caps);
    });
    rx
}

/// Deterministic fallback when no detector model is present: a single
/// motorcycle sweeping across the stop line, stepping 3px per call.
pub struct DemoDetector {
    pos: i32,
}

impl DemoDetector {
    pub fn new() -> Self {
        Self { pos: 0 }
    }

    pub fn next_detections(&mut self, width: u32, height: u32) -> Vec<Detection> {
        let span = (width as i32 - 80).max(1);
        self.pos = (self.pos + 3) % span;
        let x = self.pos;
        let y = (height as f64 * 0.70) as i32;
        vec![Detection {
            class: VehicleClass::Motorcycle,
            confidence: 0.82,
            bbox: BoundingBox::new(x, y - 30, x + 60, y + 30),
        }]
    }
}

impl Default for DemoDetector {
    fn default() -> Self {
        Self::new()
    }
}
