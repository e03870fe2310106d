// src/main.rs

use std::sync::Arc;

use anyhow::Context;
use log::info;
use tokio::sync::watch;

use frametap::config::{self, StreamConfig};
use frametap::monitoring::{self, Metrics};
use frametap::{CapturePipeline, Orchestrator};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".into());

    let cfg = Arc::new(
        config::load(&cfg_path).with_context(|| format!("failed to load {}", cfg_path))?,
    );
    info!(
        "[frametap] loaded {} ({} stream(s), every {:?}, clean_up={})",
        cfg_path,
        cfg.stream_ids.len(),
        cfg.poll_interval,
        cfg.clean_up
    );

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("[frametap] shutdown requested");
        let _ = shutdown_tx.send(true);
    })?;

    // ------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------
    let metrics = Arc::new(Metrics::new(cfg.stream_ids.iter().cloned()));
    start_monitoring(&cfg, metrics.clone())?;

    // ------------------------------------------------------------
    // Capture loop
    // ------------------------------------------------------------
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let pipeline = Arc::new(CapturePipeline::from_config(&cfg)?);
    let orchestrator = Orchestrator::new(pipeline, &cfg, metrics);

    info!("[frametap] running – Ctrl+C to stop");
    runtime.block_on(orchestrator.run_until(async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    }));

    info!("[frametap] shutdown complete");
    Ok(())
}

fn start_monitoring(cfg: &StreamConfig, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    match cfg.monitoring.http_port {
        Some(port) if port > 0 => {
            monitoring::start_monitoring_server(&format!("0.0.0.0:{}", port), metrics)
        }
        _ => Ok(()),
    }
}
