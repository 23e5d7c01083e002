use crate::types::LightState;
use std::sync::Mutex;
use std::time::Instant;

/// Last phase pushed by the light controller, plus the optional
/// countdown seconds some controllers send alongside it.
#[derive(Debug, Clone, Copy)]
pub struct LightStatus {
    pub phase: LightState,
    pub countdown: Option<u32>,
    pub updated_at: Instant,
}

/// Thread-safe cache of the externally owned signal phase. The light
/// is never driven from this process; writes come only from the
/// ingest worker, reads from everywhere.
#[derive(Debug)]
pub struct LightStateMirror {
    inner: Mutex<LightStatus>,
}

impl LightStateMirror {
    /// Starts in RED: before the first controller push the safe
    /// assumption is that violations are possible.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LightStatus {
                phase: LightState::Red,
                countdown: None,
                updated_at: Instant::now(),
            }),
        }
    }

    pub fn update(&self, phase: LightState, countdown: Option<u32>) {
        let mut status = self.inner.lock().unwrap();
        status.phase = phase;
        status.countdown = countdown;
        status.updated_at = Instant::now();
    }

    pub fn status(&self) -> LightStatus {
        *self.inner.lock().unwrap()
    }

    pub fn phase(&self) -> LightState {
        self.inner.lock().unwrap().phase
    }
}

impl Default for LightStateMirror {
    fn default() -> Self {
        Self::new()
    }
}
