// src/publish.rs
//
// Per-candidate violation handling: crop the vehicle, run plate OCR,
// dedup via the plate throttle, then build and publish the event.

use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{imageops, RgbImage};
use tracing::{debug, warn};

use crate::annotate::encode_jpeg;
use crate::capabilities::PlateReader;
use crate::context::MonitorContext;
use crate::io::MonitorIo;
use crate::plate::PlateExtractor;
use crate::throttle::PlateThrottle;
use crate::types::{Detection, Frame, ViolationEvent};

const CROP_PAD: i32 = 15;
const EVIDENCE_JPEG_QUALITY: u8 = 90;

pub const ROI_NAME: &str = "STOP_LINE";
pub const REMOTE_CAM_ID: &str = "REMOTE-CAM";
pub const LOCAL_CAM_ID: &str = "LOCAL-CAM";

pub struct ViolationPipeline {
    reader: Option<Box<dyn PlateReader>>,
    extractor: PlateExtractor,
    throttle: PlateThrottle,
    ctx: Arc<MonitorContext>,
}

impl ViolationPipeline {
    pub fn new(
        reader: Option<Box<dyn PlateReader>>,
        extractor: PlateExtractor,
        throttle: PlateThrottle,
        ctx: Arc<MonitorContext>,
    ) -> Self {
        Self {
            reader,
            extractor,
            throttle,
            ctx,
        }
    }

    pub fn reader_available(&self) -> bool {
        self.reader.is_some()
    }

    /// Handles one red-light candidate. Returns the published event, or
    /// None when the plate throttle suppressed a duplicate.
    pub fn process(
        &mut self,
        frame: &Frame,
        detection: &Detection,
        vehicles_frame: usize,
        now: Instant,
        io: &dyn MonitorIo,
    ) -> Option<ViolationEvent> {
        let counters = &self.ctx.counters;
        let crop = crop_vehicle(&frame.image, detection);

        // OCR counters only move when the reader actually ran.
        let plate = match (&mut self.reader, &crop) {
            (Some(reader), Some(crop)) => {
                let fragments = reader.read_text(crop);
                let extracted = self.extractor.extract(&fragments);
                match extracted {
                    Some(_) => counters.inc(&counters.ocr_success),
                    None => counters.inc(&counters.ocr_fail),
                }
                extracted
            }
            _ => None,
        };

        if let Some(ref plate) = plate {
            if !self.throttle.admit(plate, now) {
                debug!("Plate {} already reported recently, skipping", plate);
                return None;
            }
        }

        let image_b64 = encode_jpeg(&frame.image, EVIDENCE_JPEG_QUALITY)
            .map(|bytes| STANDARD.encode(bytes))
            .unwrap_or_default();

        let cam_id = if self.ctx.remote.seen_remote() {
            REMOTE_CAM_ID
        } else {
            LOCAL_CAM_ID
        };

        let event = ViolationEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            ts: chrono::Utc::now().timestamp(),
            plate: plate.unwrap_or_else(|| "UNKNOWN".to_string()),
            vehicle_type: detection.class.event_code().to_string(),
            speed_kmh: 0.0,
            confidence: round4(detection.confidence as f64),
            image_b64,
            cam_id: cam_id.to_string(),
            roi: ROI_NAME.to_string(),
            vehicles_frame,
        };

        warn!(
            "🚨 VIOLATION: plate={} type={} conf={:.2} cam={}",
            event.plate, event.vehicle_type, event.confidence, event.cam_id
        );
        counters.inc(&counters.violations_found);
        io.publish_violation(&event);
        Some(event)
    }
}

/// Vehicle crop with padding, clamped to the frame. None when the box
/// lies entirely outside.
fn crop_vehicle(image: &RgbImage, detection: &Detection) -> Option<RgbImage> {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let x1 = (detection.bbox.x1 - CROP_PAD).max(0);
    let y1 = (detection.bbox.y1 - CROP_PAD).max(0);
    let x2 = (detection.bbox.x2 + CROP_PAD).min(w);
    let y2 = (detection.bbox.y2 + CROP_PAD).min(h);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(
        imageops::crop_imm(
            image,
            x1 as u32,
            y1 as u32,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
        )
        .to_image(),
    )
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, ContextSnapshot, FrameOrigin, PlateFragment, VehicleClass};
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingIo {
        violations: Mutex<Vec<ViolationEvent>>,
        contexts: Mutex<Vec<ContextSnapshot>>,
    }

    impl MonitorIo for RecordingIo {
        fn read_light(&self) -> crate::light::LightStatus {
            crate::light::LightStatus {
                phase: crate::types::LightState::Red,
                countdown: None,
                updated_at: Instant::now(),
            }
        }

        fn publish_violation(&self, event: &ViolationEvent) {
            self.violations.lock().unwrap().push(event.clone());
        }

        fn publish_context(&self, snapshot: &ContextSnapshot) {
            self.contexts.lock().unwrap().push(snapshot.clone());
        }

        fn push_frame(&self, _jpeg: Vec<u8>) {}
    }

    struct FakeReader {
        fragments: Vec<PlateFragment>,
        crops: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl FakeReader {
        fn returning(texts: &[(&str, f32)]) -> Box<Self> {
            Self::with_crop_log(texts).0
        }

        fn with_crop_log(texts: &[(&str, f32)]) -> (Box<Self>, Arc<Mutex<Vec<(u32, u32)>>>) {
            let crops = Arc::new(Mutex::new(Vec::new()));
            let reader = Box::new(Self {
                fragments: texts
                    .iter()
                    .map(|(t, c)| PlateFragment {
                        text: t.to_string(),
                        confidence: *c,
                    })
                    .collect(),
                crops: crops.clone(),
            });
            (reader, crops)
        }
    }

    impl PlateReader for FakeReader {
        fn read_text(&mut self, crop: &RgbImage) -> Vec<PlateFragment> {
            self.crops.lock().unwrap().push((crop.width(), crop.height()));
            self.fragments.clone()
        }
    }

    fn test_frame(w: u32, h: u32) -> Frame {
        Frame {
            image: RgbImage::new(w, h),
            origin: FrameOrigin::Local,
        }
    }

    fn detection_at(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection {
            class: VehicleClass::Motorcycle,
            confidence: 0.87654321,
            bbox: BoundingBox::new(x1, y1, x2, y2),
        }
    }

    fn pipeline_with(
        reader: Option<Box<dyn PlateReader>>,
    ) -> (ViolationPipeline, Arc<MonitorContext>) {
        let ctx = Arc::new(MonitorContext::new());
        let pipeline = ViolationPipeline::new(
            reader,
            PlateExtractor::new().unwrap(),
            PlateThrottle::new(Duration::from_secs(30)),
            ctx.clone(),
        );
        (pipeline, ctx)
    }

    #[test]
    fn successful_ocr_produces_a_normalized_plate() {
        let io = RecordingIo::default();
        let (mut pipeline, ctx) =
            pipeline_with(Some(FakeReader::returning(&[("51B-12345", 0.9)])));
        let frame = test_frame(320, 240);
        let event = pipeline
            .process(&frame, &detection_at(50, 50, 150, 150), 2, Instant::now(), &io)
            .unwrap();

        assert_eq!(event.plate, "51B1-2345");
        assert_eq!(event.vehicle_type, "MOTORBIKE");
        assert_eq!(event.speed_kmh, 0.0);
        assert_eq!(event.confidence, 0.8765);
        assert_eq!(event.roi, "STOP_LINE");
        assert_eq!(event.vehicles_frame, 2);
        assert!(!event.image_b64.is_empty());
        assert_eq!(ctx.counters.ocr_success.load(Ordering::Relaxed), 1);
        assert_eq!(ctx.counters.ocr_fail.load(Ordering::Relaxed), 0);
        assert_eq!(io.violations.lock().unwrap().len(), 1);
    }

    #[test]
    fn unreadable_fragments_still_emit_an_unknown_event() {
        let io = RecordingIo::default();
        let (mut pipeline, ctx) = pipeline_with(Some(FakeReader::returning(&[("@@", 0.9)])));
        let frame = test_frame(320, 240);
        let event = pipeline
            .process(&frame, &detection_at(50, 50, 150, 150), 1, Instant::now(), &io)
            .unwrap();

        assert_eq!(event.plate, "UNKNOWN");
        assert_eq!(ctx.counters.ocr_fail.load(Ordering::Relaxed), 1);
        assert_eq!(ctx.counters.violations_found.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn missing_reader_skips_ocr_counters() {
        let io = RecordingIo::default();
        let (mut pipeline, ctx) = pipeline_with(None);
        let frame = test_frame(320, 240);
        let event = pipeline
            .process(&frame, &detection_at(50, 50, 150, 150), 1, Instant::now(), &io)
            .unwrap();

        assert_eq!(event.plate, "UNKNOWN");
        assert_eq!(ctx.counters.ocr_success.load(Ordering::Relaxed), 0);
        assert_eq!(ctx.counters.ocr_fail.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn throttle_suppresses_repeat_plates_but_not_unknown() {
        let io = RecordingIo::default();
        let (mut pipeline, ctx) =
            pipeline_with(Some(FakeReader::returning(&[("36F-8888", 0.9)])));
        let frame = test_frame(320, 240);
        let det = detection_at(50, 50, 150, 150);
        let t0 = Instant::now();

        assert!(pipeline.process(&frame, &det, 1, t0, &io).is_some());
        assert!(pipeline
            .process(&frame, &det, 1, t0 + Duration::from_secs(10), &io)
            .is_none());
        assert!(pipeline
            .process(&frame, &det, 1, t0 + Duration::from_secs(31), &io)
            .is_some());
        assert_eq!(ctx.counters.violations_found.load(Ordering::Relaxed), 2);

        // Unreadable plates are exempt from the throttle.
        let (mut unknown_pipeline, _) = pipeline_with(None);
        assert!(unknown_pipeline.process(&frame, &det, 1, t0, &io).is_some());
        assert!(unknown_pipeline.process(&frame, &det, 1, t0, &io).is_some());
    }

    #[test]
    fn crop_is_padded_and_clamped() {
        let io = RecordingIo::default();
        let (reader, crops) = FakeReader::with_crop_log(&[]);
        let frame = test_frame(100, 80);
        let mut pipeline = ViolationPipeline::new(
            Some(reader),
            PlateExtractor::new().unwrap(),
            PlateThrottle::new(Duration::from_secs(30)),
            Arc::new(MonitorContext::new()),
        );

        // Box spilling over the top-left corner: pad 15 then clamp to 0.
        pipeline.process(&frame, &detection_at(-10, -10, 40, 40), 1, Instant::now(), &io);
        assert_eq!(crops.lock().unwrap().as_slice(), &[(55, 55)]);

        // Box entirely outside the frame: no crop, reader never runs.
        let (mut outside_pipeline, outside_ctx) =
            pipeline_with(Some(FakeReader::returning(&[("51B-12345", 0.9)])));
        let event = outside_pipeline
            .process(&frame, &detection_at(200, 200, 300, 300), 1, Instant::now(), &io)
            .unwrap();
        assert_eq!(event.plate, "UNKNOWN");
        assert_eq!(outside_ctx.counters.ocr_success.load(Ordering::Relaxed), 0);
        assert_eq!(outside_ctx.counters.ocr_fail.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn cam_id_follows_the_remote_latch() {
        let io = RecordingIo::default();
        let frame = test_frame(320, 240);
        let det = detection_at(50, 50, 150, 150);

        let (mut local_pipeline, _) = pipeline_with(None);
        let event = local_pipeline
            .process(&frame, &det, 1, Instant::now(), &io)
            .unwrap();
        assert_eq!(event.cam_id, "LOCAL-CAM");

        let (mut remote_pipeline, ctx) = pipeline_with(None);
        ctx.remote.store(vec![0xFF, 0xD8]);
        let event = remote_pipeline
            .process(&frame, &det, 1, Instant::now(), &io)
            .unwrap();
        assert_eq!(event.cam_id, "REMOTE-CAM");
    }

    #[test]
    fn evidence_image_is_valid_base64_jpeg() {
        let io = RecordingIo::default();
        let (mut pipeline, _) = pipeline_with(None);
        let frame = test_frame(64, 48);
        let event = pipeline
            .process(&frame, &detection_at(5, 5, 40, 40), 1, Instant::now(), &io)
            .unwrap();
        let bytes = STANDARD.decode(event.image_b64.as_bytes()).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
