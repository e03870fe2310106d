// src/capture/scheduler.rs - periodic fan-out of capture attempts
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};

use super::pipeline::{AttemptLease, AttemptRunner};
use crate::config::StreamConfig;
use crate::core::{CaptureError, ComponentLogger, LogContext};
use crate::monitoring::Metrics;

struct InFlight {
    cycle: u64,
    handle: JoinHandle<()>,
    lease: AttemptLease,
}

impl InFlight {
    // a timed-out attempt may still have blocking work running
    fn is_busy(&self) -> bool {
        !self.handle.is_finished() || self.lease.is_held()
    }
}

/// Owns the poll timer. Each tick launches one attempt per stream; a stream
/// whose previous attempt (or any blocking job it started) is still running
/// is skipped for that tick, so at most one attempt per stream is ever in
/// flight.
pub struct Orchestrator<R: AttemptRunner> {
    runner: Arc<R>,
    stream_ids: Vec<String>,
    interval: Duration,
    attempt_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl<R: AttemptRunner> Orchestrator<R> {
    pub fn new(runner: Arc<R>, cfg: &StreamConfig, metrics: Arc<Metrics>) -> Self {
        Self::with_timing(
            runner,
            cfg.stream_ids.clone(),
            cfg.poll_interval,
            cfg.attempt_timeout,
            metrics,
        )
    }

    pub fn with_timing(
        runner: Arc<R>,
        stream_ids: Vec<String>,
        interval: Duration,
        attempt_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            runner,
            stream_ids,
            interval,
            attempt_timeout,
            metrics,
        }
    }

    /// Never returns.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until `shutdown` completes, then aborts attempts still in flight.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: HashMap<String, InFlight> = HashMap::new();
        let mut cycle: u64 = 0;

        info!(
            "[capture] polling {} stream(s) every {:?}",
            self.stream_ids.len(),
            self.interval
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    cycle += 1;
                    self.fan_out(cycle, &mut in_flight);
                }
            }
        }

        let pending = in_flight
            .values()
            .filter(|f| !f.handle.is_finished())
            .count();
        for (_, f) in in_flight.drain() {
            f.handle.abort();
        }
        info!("[capture] stopped after {} cycle(s), {} attempt(s) aborted", cycle, pending);
    }

    fn fan_out(&self, cycle: u64, in_flight: &mut HashMap<String, InFlight>) {
        for stream_id in &self.stream_ids {
            let ctx = LogContext::new("capture", stream_id).with_cycle(cycle);

            if let Some(prev) = in_flight.get(stream_id) {
                if prev.is_busy() {
                    ctx.warn(&format!("skipped, cycle {} still running", prev.cycle));
                    if let Some(m) = self.metrics.stream(stream_id) {
                        m.skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    continue;
                }
            }

            let lease = AttemptLease::new();
            let handle = tokio::spawn(attempt(
                self.runner.clone(),
                ctx,
                lease.clone(),
                self.attempt_timeout,
                self.metrics.clone(),
            ));
            in_flight.insert(
                stream_id.clone(),
                InFlight {
                    cycle,
                    handle,
                    lease,
                },
            );
        }
    }
}

// Failures end here: they are logged and counted, never propagated.
async fn attempt<R: AttemptRunner>(
    runner: Arc<R>,
    ctx: LogContext,
    lease: AttemptLease,
    deadline: Duration,
    metrics: Arc<Metrics>,
) {
    let stats = metrics.stream(&ctx.stream_id);
    if let Some(m) = stats {
        m.attempts.fetch_add(1, Ordering::Relaxed);
    }

    match timeout(deadline, runner.run_attempt(ctx.clone(), lease)).await {
        Ok(Ok(report)) => {
            ctx.info(&format!(
                "frame {} ({} bytes) from {}, {} removed, {}ms",
                report.frame.display(),
                report.frame_bytes,
                report.segment_uri,
                report.removed,
                ctx.elapsed_ms()
            ));
            if let Some(m) = stats {
                m.mark_captured(report.removed);
            }
        }
        Ok(Err(e)) => {
            match e.source {
                CaptureError::Worker { .. } => ctx.error(&e.to_string()),
                _ => ctx.warn(&e.to_string()),
            }
            if let Some(m) = stats {
                m.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        Err(_) => {
            ctx.warn(&format!("cancelled after {:?}", deadline));
            if let Some(m) = stats {
                m.timed_out.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
