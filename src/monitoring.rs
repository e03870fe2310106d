use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::core::utc_ns_now;

#[derive(Debug, Default)]
pub struct StreamMetrics {
    pub attempts: AtomicU64,
    pub captured: AtomicU64,
    pub failed: AtomicU64,
    pub skipped: AtomicU64,
    pub timed_out: AtomicU64,
    pub frames_removed: AtomicU64,
    pub last_capture_utc_ns: AtomicU64,
}

impl StreamMetrics {
    pub fn mark_captured(&self, removed: usize) {
        self.captured.fetch_add(1, Ordering::Relaxed);
        self.frames_removed.fetch_add(removed as u64, Ordering::Relaxed);
        self.last_capture_utc_ns.store(utc_ns_now(), Ordering::Relaxed);
    }
}

/// Per-stream counters. The stream set is fixed at startup, so the map itself
/// is never mutated.
#[derive(Debug, Default)]
pub struct Metrics {
    streams: BTreeMap<String, StreamMetrics>,
}

impl Metrics {
    pub fn new<I, S>(stream_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            streams: stream_ids
                .into_iter()
                .map(|id| (id.into(), StreamMetrics::default()))
                .collect(),
        }
    }

    pub fn stream(&self, stream_id: &str) -> Option<&StreamMetrics> {
        self.streams.get(stream_id)
    }

    pub fn streams(&self) -> impl Iterator<Item = (&String, &StreamMetrics)> {
        self.streams.iter()
    }
}

pub fn start_monitoring_server(bind: &str, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let server = Server::http(bind).map_err(|e| anyhow::anyhow!(e))?;
    log::info!("[monitoring] server on {}", bind);

    thread::spawn(move || {
        for req in server.incoming_requests() {
            let response = match (req.method(), req.url()) {
                (&Method::Get, "/health") => text_response("ok", "text/plain"),
                (&Method::Get, "/metrics") => {
                    text_response(&build_metrics(&metrics), "text/plain; version=0.0.4")
                }
                _ => Response::from_string("").with_status_code(StatusCode(404)),
            };
            let _ = req.respond(response);
        }
    });

    Ok(())
}

fn text_response(body: &str, content_type: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string(body).with_status_code(StatusCode(200));
    match Header::from_bytes("Content-Type", content_type) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

pub fn build_metrics(metrics: &Metrics) -> String {
    let mut output = String::new();

    write_counter(&mut output, metrics, "attempts_total", "Capture attempts started.", |m| {
        &m.attempts
    });
    write_counter(&mut output, metrics, "captured_total", "Frames captured and stored.", |m| {
        &m.captured
    });
    write_counter(
        &mut output,
        metrics,
        "failed_total",
        "Capture attempts that failed in any stage.",
        |m| &m.failed,
    );
    write_counter(
        &mut output,
        metrics,
        "skipped_total",
        "Ticks skipped because the previous attempt was still running.",
        |m| &m.skipped,
    );
    write_counter(
        &mut output,
        metrics,
        "timed_out_total",
        "Capture attempts cancelled at their deadline.",
        |m| &m.timed_out,
    );
    write_counter(
        &mut output,
        metrics,
        "frames_removed_total",
        "Frames deleted by retention.",
        |m| &m.frames_removed,
    );

    let _ = writeln!(
        output,
        "# HELP frametap_last_capture_seconds Unix time of the last stored frame."
    );
    let _ = writeln!(output, "# TYPE frametap_last_capture_seconds gauge");
    for (stream, m) in metrics.streams() {
        let ns = m.last_capture_utc_ns.load(Ordering::Relaxed);
        if ns > 0 {
            let _ = writeln!(
                output,
                "frametap_last_capture_seconds{{stream=\"{}\"}} {}",
                escape_label_value(stream),
                ns as f64 / 1_000_000_000.0
            );
        }
    }

    output
}

fn write_counter(
    output: &mut String,
    metrics: &Metrics,
    name: &str,
    help: &str,
    counter: impl Fn(&StreamMetrics) -> &AtomicU64,
) {
    let _ = writeln!(output, "# HELP frametap_{} {}", name, help);
    let _ = writeln!(output, "# TYPE frametap_{} counter", name);
    for (stream, m) in metrics.streams() {
        let _ = writeln!(
            output,
            "frametap_{}{{stream=\"{}\"}} {}",
            name,
            escape_label_value(stream),
            counter(m).load(Ordering::Relaxed)
        );
    }
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\"', "\\\"")
}
