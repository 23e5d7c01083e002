// src/context.rs
//
// Process-wide shared state. One MonitorContext per process, owned by
// main; every worker gets an Arc handle at construction. Each field
// carries its own lock and no operation takes two of them.

use crate::ingest::RemoteFrameState;
use crate::light::LightStateMirror;
use crate::metrics::PerfCounters;
use crate::types::DisplayInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// One encoded frame plus its capture time.
#[derive(Debug, Clone)]
pub struct SharedFrame {
    pub jpeg: Vec<u8>,
    pub at: Instant,
}

/// Single-frame overwrite slot. No queueing: a new publish replaces
/// whatever was there, freshness over completeness.
#[derive(Debug, Default)]
pub struct FrameSlot {
    inner: Mutex<Option<SharedFrame>>,
}

impl FrameSlot {
    pub fn publish(&self, jpeg: Vec<u8>) {
        self.publish_at(jpeg, Instant::now());
    }

    pub fn publish_at(&self, jpeg: Vec<u8>, at: Instant) {
        *self.inner.lock().unwrap() = Some(SharedFrame { jpeg, at });
    }

    pub fn latest(&self) -> Option<SharedFrame> {
        self.inner.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
pub struct MonitorContext {
    pub light: LightStateMirror,
    pub remote: RemoteFrameState,
    pub counters: PerfCounters,
    display: Mutex<DisplayInfo>,
    /// Annotated detection frames handed to the monitor stream.
    pub handoff: FrameSlot,
    /// Overlaid frames the monitor stream produces for consumers.
    pub monitor_out: FrameSlot,
    stop: AtomicBool,
}

impl MonitorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn set_display(&self, info: DisplayInfo) {
        *self.display.lock().unwrap() = info;
    }

    pub fn display(&self) -> DisplayInfo {
        *self.display.lock().unwrap()
    }
}
