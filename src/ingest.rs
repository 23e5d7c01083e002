// src/ingest.rs
//
// Remote camera ingest: latest-frame buffer, one-way "ever seen"
// latch, payload decoding for the frame and light channels, and the
// reconnect worker that keeps a RemoteLink alive with exponential
// backoff.

use crate::context::MonitorContext;
use crate::light::LightStateMirror;
use crate::metrics::PerfCounters;
use crate::types::LightState;
use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const INITIAL_RETRY: Duration = Duration::from_secs(5);
const MAX_RETRY: Duration = Duration::from_secs(60);

/// One remote frame as received, with its arrival time.
#[derive(Debug, Clone)]
pub struct RemoteFrame {
    pub bytes: Vec<u8>,
    pub received_at: Instant,
}

/// Shared remote-camera state: the latest frame and the latch that
/// records whether a remote camera was ever seen. The latch never
/// resets; source labeling stays "remote" for the process lifetime.
#[derive(Debug, Default)]
pub struct RemoteFrameState {
    buffer: Mutex<Option<RemoteFrame>>,
    ever_seen: AtomicBool,
}

impl RemoteFrameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, bytes: Vec<u8>) {
        self.store_at(bytes, Instant::now());
    }

    pub fn store_at(&self, bytes: Vec<u8>, at: Instant) {
        {
            let mut buffer = self.buffer.lock().unwrap();
            *buffer = Some(RemoteFrame {
                bytes,
                received_at: at,
            });
        }
        if !self.ever_seen.swap(true, Ordering::SeqCst) {
            info!("🎉 ═══════════════════════════════════════════════");
            info!("🎉  REMOTE CAMERA CONNECTED - switching to REAL mode");
            info!("🎉  Detection now prefers remote frames");
            info!("🎉  The monitor stream continues independently");
            info!("🎉 ═══════════════════════════════════════════════");
        }
    }

    pub fn latest(&self) -> Option<RemoteFrame> {
        self.buffer.lock().unwrap().clone()
    }

    pub fn seen_remote(&self) -> bool {
        self.ever_seen.load(Ordering::SeqCst)
    }
}

/// Frame-channel payloads arrive either as raw JPEG bytes or as
/// base64 text; base64 is detected by its leading characters. A frame
/// that fails to decode is dropped and the previous buffer kept.
pub fn handle_frame_payload(remote: &RemoteFrameState, counters: &PerfCounters, payload: &[u8]) {
    let looks_base64 = matches!(payload, [b'/', b'/', ..] | [b'/', b'9', ..] | [b'i', b'V', ..]);
    let bytes = if looks_base64 {
        match STANDARD.decode(payload.trim_ascii_end()) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("Remote frame base64 decode error: {}", e);
                return;
            }
        }
    } else {
        payload.to_vec()
    };

    remote.store(bytes);
    counters.inc(&counters.remote_frames);
}

#[derive(Debug, Deserialize)]
struct LightMessage {
    #[serde(default)]
    light: String,
    #[serde(default)]
    countdown: Option<i64>,
}

/// Light-channel payloads carry `{"light": "RED", "countdown": 12}`.
/// Unknown phases and malformed messages are dropped silently so a
/// misbehaving controller cannot wedge the mirror.
pub fn handle_light_payload(mirror: &LightStateMirror, payload: &[u8]) {
    let msg: LightMessage = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Malformed light message: {}", e);
            return;
        }
    };
    match LightState::parse(&msg.light.to_uppercase()) {
        Some(phase) => {
            let countdown = msg.countdown.and_then(|c| u32::try_from(c).ok());
            mirror.update(phase, countdown);
        }
        None => debug!("Ignoring unknown light phase: {:?}", msg.light),
    }
}

/// Message pulled off the remote link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Frame(Vec<u8>),
    Light(Vec<u8>),
}

/// Transport seam for the remote camera subscription. The production
/// implementation speaks newline-delimited JSON over TCP; tests
/// script one.
#[async_trait]
pub trait RemoteLink: Send {
    async fn connect(&mut self) -> Result<()>;
    async fn recv(&mut self) -> Result<LinkEvent>;
    async fn close(&mut self) -> Result<()>;
}

/// Long-lived ingest worker. Connect, pump messages, and on any
/// failure back off (5s doubling to 60s, reset to 5s after a
/// successful connect) until the process stop flag is raised.
pub async fn run_remote_ingest(ctx: Arc<MonitorContext>, mut link: impl RemoteLink) {
    let mut retry_delay = INITIAL_RETRY;

    while !ctx.should_stop() {
        let cycle = match link.connect().await {
            Ok(()) => {
                info!("✅ Remote link connected | frame + light channels subscribed");
                retry_delay = INITIAL_RETRY;
                pump(&ctx, &mut link).await
            }
            Err(e) => Err(e),
        };

        if ctx.should_stop() {
            break;
        }
        if let Err(e) = cycle {
            error!(
                "Remote link error: {:#} - retry in {}s",
                e,
                retry_delay.as_secs()
            );
            tokio::time::sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(MAX_RETRY);
        }
    }

    let _ = link.close().await;
    info!("🛑 Remote ingest worker stopped");
}

async fn pump(ctx: &MonitorContext, link: &mut impl RemoteLink) -> Result<()> {
    loop {
        if ctx.should_stop() {
            return Ok(());
        }
        match link.recv().await? {
            LinkEvent::Frame(payload) => {
                handle_frame_payload(&ctx.remote, &ctx.counters, &payload)
            }
            LinkEvent::Light(payload) => handle_light_payload(&ctx.light, &payload),
        }
    }
}
