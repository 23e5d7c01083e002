// src/metrics.rs
//
// Shared performance counters. Every worker bumps its own counts;
// the status reporter reads a summary snapshot.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct PerfCounters {
    pub total_frames: AtomicU64,
    pub remote_frames: AtomicU64,
    pub local_frames: AtomicU64,
    pub synthetic_frames: AtomicU64,
    pub detection_frames: AtomicU64,
    pub ocr_success: AtomicU64,
    pub ocr_fail: AtomicU64,
    pub violations_found: AtomicU64,
    detection_fps: AtomicU32,
    display_fps: AtomicU32,
    pub started_at: Instant,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            total_frames: AtomicU64::new(0),
            remote_frames: AtomicU64::new(0),
            local_frames: AtomicU64::new(0),
            synthetic_frames: AtomicU64::new(0),
            detection_frames: AtomicU64::new(0),
            ocr_success: AtomicU64::new(0),
            ocr_fail: AtomicU64::new(0),
            violations_found: AtomicU64::new(0),
            detection_fps: AtomicU32::new(0),
            display_fps: AtomicU32::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_detection_fps(&self, fps: f32) {
        self.detection_fps.store(fps.to_bits(), Ordering::Relaxed);
    }

    pub fn detection_fps(&self) -> f32 {
        f32::from_bits(self.detection_fps.load(Ordering::Relaxed))
    }

    pub fn set_display_fps(&self, fps: f32) {
        self.display_fps.store(fps.to_bits(), Ordering::Relaxed);
    }

    pub fn display_fps(&self) -> f32 {
        f32::from_bits(self.display_fps.load(Ordering::Relaxed))
    }

    pub fn summary(&self) -> CounterSummary {
        CounterSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            remote_frames: self.remote_frames.load(Ordering::Relaxed),
            local_frames: self.local_frames.load(Ordering::Relaxed),
            synthetic_frames: self.synthetic_frames.load(Ordering::Relaxed),
            detection_frames: self.detection_frames.load(Ordering::Relaxed),
            ocr_success: self.ocr_success.load(Ordering::Relaxed),
            ocr_fail: self.ocr_fail.load(Ordering::Relaxed),
            violations_found: self.violations_found.load(Ordering::Relaxed),
            detection_fps: self.detection_fps(),
            display_fps: self.display_fps(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CounterSummary {
    pub total_frames: u64,
    pub remote_frames: u64,
    pub local_frames: u64,
    pub synthetic_frames: u64,
    pub detection_frames: u64,
    pub ocr_success: u64,
    pub ocr_fail: u64,
    pub violations_found: u64,
    pub detection_fps: f32,
    pub display_fps: f32,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = PerfCounters::new();
        counters.inc(&counters.total_frames);
        counters.inc(&counters.total_frames);
        counters.inc(&counters.violations_found);

        let summary = counters.summary();
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.violations_found, 1);
        assert_eq!(summary.remote_frames, 0);
    }

    #[test]
    fn fps_cells_round_trip() {
        let counters = PerfCounters::new();
        counters.set_detection_fps(27.5);
        counters.set_display_fps(39.9);
        assert_eq!(counters.detection_fps(), 27.5);
        assert_eq!(counters.display_fps(), 39.9);
    }

    #[test]
    fn summary_serializes() {
        let counters = PerfCounters::new();
        counters.inc(&counters.ocr_success);
        let json = serde_json::to_value(counters.summary()).unwrap();
        assert_eq!(json["ocr_success"], 1);
        assert!(json["elapsed_secs"].is_f64());
    }
}
