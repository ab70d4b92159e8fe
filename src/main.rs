//! Application entry point: headless sound radar.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load and validate [`AppConfig`] (defaults on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the classification client ([`ApiClassifier`]) from config.
//! 5. Spawn the capture thread (owns the cpal device).
//! 6. Spawn the processing task on the runtime.
//! 7. Print every [`FrameOutput`] as one JSON line on stdout until Ctrl-C.
//!
//! `sound-radar --list-devices` prints the capture devices and exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use sound_radar::{
    audio::{list_devices, AudioFrame, CpalBackend},
    classify::ApiClassifier,
    config::AppConfig,
    pipeline::{new_shared_state, spawn_capture_thread, RadarPipeline},
    radar::FrameOutput,
};

/// Captured frames waiting for the processing task.
const FRAME_QUEUE: usize = 4;
/// Outputs waiting for the consumer before new ones are dropped.
const OUTPUT_QUEUE: usize = 16;

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if std::env::args().skip(1).any(|a| a == "--list-devices") {
        for name in list_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    log::info!("Sound radar starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.validate().context("invalid configuration")?;
    log::info!(
        "Layout: {} | frame {:.2} s | top-{} | threshold {:.2} | radar {}",
        config.radar.channel_layout.label(),
        config.capture.frame_duration_secs,
        config.classifier.top_k,
        config.classifier.confidence_threshold,
        if config.radar.enabled { "on" } else { "off" }
    );

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Classifier
    let classifier =
        ApiClassifier::from_config(&config.classifier, config.capture.target_sample_rate);

    let state = new_shared_state(config);
    let cancel = Arc::new(AtomicBool::new(false));

    let (frame_tx, frame_rx) = mpsc::channel::<AudioFrame>(FRAME_QUEUE);
    let (output_tx, mut output_rx) = mpsc::channel::<FrameOutput>(OUTPUT_QUEUE);

    // 5. Capture thread
    let capture = spawn_capture_thread(
        CpalBackend::new,
        Arc::clone(&state),
        frame_tx,
        Arc::clone(&cancel),
    )?;

    rt.block_on(async {
        // 6. Processing task
        let pipeline = RadarPipeline::new(Arc::clone(&state), Arc::new(classifier));
        let worker = tokio::spawn(pipeline.run(frame_rx, output_tx, Arc::clone(&cancel)));

        let signal_cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Ctrl-C received, finishing the current frame");
                signal_cancel.store(true, Ordering::Relaxed);
            }
        });

        // 7. Consumer
        while let Some(output) = output_rx.recv().await {
            match serde_json::to_string(&output) {
                Ok(line) => println!("{line}"),
                Err(e) => log::error!("failed to serialize frame output: {e}"),
            }
        }

        if let Err(e) = worker.await {
            log::error!("processing task failed: {e}");
        }
    });

    capture.join()?;
    log::info!("{}", state.lock().unwrap().status_line());
    Ok(())
}
