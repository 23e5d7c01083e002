// src/main.rs

mod annotate;
mod bus;
mod capabilities;
mod config;
mod context;
mod detection;
mod frame_source;
mod ingest;
mod io;
mod light;
mod metrics;
mod monitor_stream;
mod plate;
mod publish;
mod remote_link;
mod synthetic;
mod throttle;
mod types;
mod zone;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bus::BusClient;
use capabilities::{spawn_capability_loader, Capabilities};
use config::Config;
use context::MonitorContext;
use detection::run_detection;
use frame_source::open_local_camera;
use ingest::run_remote_ingest;
use io::{BusIo, MonitorIo};
use monitor_stream::run_monitor_stream;
use remote_link::TcpJsonLink;

const STATUS_POLL: Duration = Duration::from_secs(1);
const STATUS_INTERVAL: Duration = Duration::from_secs(60);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("REDLIGHT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    // Load before the subscriber exists, log the outcome after.
    let loaded = Config::load(&config_path);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("🚦 Red Light Violation Monitor Starting");
    match loaded {
        Ok(_) => info!("✓ Configuration loaded from {}", config_path),
        Err(e) => warn!("⚠️ {:#} - using default configuration", e),
    }

    let ctx = Arc::new(MonitorContext::new());

    let bus = BusClient::new(&config.publish)?;
    let io: Arc<dyn MonitorIo> = Arc::new(BusIo::new(ctx.clone(), bus));
    info!(
        "✓ Event publisher ready (storage={}, bus={})",
        config.publish.storage_url, config.publish.bus_url
    );

    // The default build ships without model weights; the loader reports
    // both capabilities OFF and the loop runs its demo fallback.
    let caps_rx = spawn_capability_loader(Box::new(Capabilities::empty));

    let camera = open_local_camera(&config.camera.frames_dir);

    let mut workers: Vec<(&str, JoinHandle<()>)> = Vec::new();

    workers.push((
        "remote ingest",
        tokio::spawn(run_remote_ingest(
            ctx.clone(),
            TcpJsonLink::new(config.remote.addr.clone()),
        )),
    ));
    workers.push((
        "detection",
        tokio::spawn({
            let ctx = ctx.clone();
            let io = io.clone();
            let config = config.clone();
            async move {
                if let Err(e) = run_detection(ctx, io, camera, config, caps_rx).await {
                    error!("Detection worker failed: {:#}", e);
                }
            }
        }),
    ));
    workers.push((
        "monitor stream",
        tokio::spawn(run_monitor_stream(ctx.clone(), config.clone())),
    ));
    workers.push(("status", tokio::spawn(run_status_reporter(ctx.clone()))));

    info!("🚀 All workers started | remote={}", config.remote.addr);

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutdown signal received, stopping workers...");
    ctx.request_stop();

    for (name, mut handle) in workers {
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{} worker panicked: {}", name, e),
            Err(_) => {
                warn!("{} worker did not stop in time, aborting", name);
                handle.abort();
            }
        }
    }

    let summary = ctx.counters.summary();
    info!("📊 Final Report:");
    info!(
        "  Total frames: {} (remote={}, local={}, synthetic={})",
        summary.total_frames, summary.remote_frames, summary.local_frames, summary.synthetic_frames
    );
    info!("  Detection frames: {}", summary.detection_frames);
    info!(
        "  OCR reads: {} ok, {} failed",
        summary.ocr_success, summary.ocr_fail
    );
    info!("  🚨 Violations: {}", summary.violations_found);
    info!("  Uptime: {:.0}s", summary.elapsed_secs);
    info!("✓ Shutdown complete");

    Ok(())
}

/// Periodic counter dump. Polls the stop flag every second so shutdown
/// is not held up by the reporting interval.
async fn run_status_reporter(ctx: Arc<MonitorContext>) {
    let mut since_report = Duration::ZERO;
    while !ctx.should_stop() {
        tokio::time::sleep(STATUS_POLL).await;
        since_report += STATUS_POLL;
        if since_report < STATUS_INTERVAL {
            continue;
        }
        since_report = Duration::ZERO;

        let summary = ctx.counters.summary();
        info!(
            "📊 Status | frames={} (remote={} local={} synthetic={}) | det_fps={:.1} disp_fps={:.1} | ocr_ok={} ocr_fail={} | violations={}",
            summary.total_frames,
            summary.remote_frames,
            summary.local_frames,
            summary.synthetic_frames,
            summary.detection_fps,
            summary.display_fps,
            summary.ocr_success,
            summary.ocr_fail,
            summary.violations_found
        );
    }
}
