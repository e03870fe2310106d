// src/capture/pipeline.rs - one capture attempt for one stream
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::config::StreamConfig;
use crate::core::{
    CaptureError, CaptureResult, ComponentLogger, LogContext, Stage, StageContext, StageError,
};
use crate::io::ffmpeg_frame::FrameExtractor;
use crate::io::hls_in::SegmentFetcher;
use crate::recorder::{FrameStore, RetentionManager};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub segment_uri: String,
    pub frame: PathBuf,
    pub frame_bytes: usize,
    pub removed: usize,
}

/// Marks a stream busy while any work of its attempt is alive.
///
/// The orchestrator keeps one handle per stream and gives a clone to the
/// attempt. Blocking jobs carry their own clone, so the stream stays busy
/// until they return even when the attempt future was dropped at its deadline.
#[derive(Debug, Clone, Default)]
pub struct AttemptLease(Arc<()>);

impl AttemptLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a clone other than `self` is still alive.
    pub fn is_held(&self) -> bool {
        Arc::strong_count(&self.0) > 1
    }
}

/// Work the orchestrator launches for one stream on one tick.
pub trait AttemptRunner: Send + Sync + 'static {
    fn run_attempt(
        self: Arc<Self>,
        ctx: LogContext,
        lease: AttemptLease,
    ) -> BoxFuture<'static, Result<CaptureReport, StageError>>;
}

/// resolve → fetch → extract → persist → cleanup, strictly in that order.
pub struct CapturePipeline {
    fetcher: SegmentFetcher,
    extractor: FrameExtractor,
    store: FrameStore,
    retention: Option<RetentionManager>,
}

impl CapturePipeline {
    pub fn new(
        fetcher: SegmentFetcher,
        extractor: FrameExtractor,
        store: FrameStore,
        retention: Option<RetentionManager>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            retention,
        }
    }

    pub fn from_config(cfg: &StreamConfig) -> anyhow::Result<Self> {
        let store = FrameStore::new(&cfg.output_dir);
        let retention = cfg
            .clean_up
            .then(|| RetentionManager::from_config(store.clone(), &cfg.retention));

        Ok(Self::new(
            SegmentFetcher::from_config(cfg)?,
            FrameExtractor::new(&cfg.extractor),
            store,
            retention,
        ))
    }

    pub async fn capture(&self, ctx: &LogContext) -> Result<CaptureReport, StageError> {
        self.capture_leased(ctx, &AttemptLease::new()).await
    }

    /// Like [`capture`](Self::capture), with every blocking job holding `lease`.
    pub async fn capture_leased(
        &self,
        ctx: &LogContext,
        lease: &AttemptLease,
    ) -> Result<CaptureReport, StageError> {
        let stream_id = ctx.stream_id.clone();

        let fetcher = self.fetcher.clone();
        let id = stream_id.clone();
        let segment_uri = blocking(lease, move || fetcher.resolve_latest_segment(&id))
            .await
            .at(Stage::Resolve)?;

        let fetcher = self.fetcher.clone();
        let id = stream_id.clone();
        let uri = segment_uri.clone();
        let payload = blocking(lease, move || fetcher.fetch_segment(&id, &uri))
            .await
            .at(Stage::Fetch)?;
        ctx.debug(&format!("segment {} ({} bytes)", segment_uri, payload.len()));

        let jpeg = self.extractor.extract_frame(payload).await.at(Stage::Extract)?;
        let frame_bytes = jpeg.len();

        let store = self.store.clone();
        let retention = self.retention.clone();
        let log_ctx = ctx.clone();
        let (frame, removed) = blocking(lease, move || {
            let path = store.persist_frame(&stream_id, &jpeg)?;

            let removed = match &retention {
                Some(manager) => match manager.enforce_retention(&stream_id, Some(&path)) {
                    Ok(n) => n,
                    Err(e) => {
                        log_ctx.warn(&format!("retention skipped: {}", e));
                        0
                    }
                },
                None => 0,
            };

            Ok((path, removed))
        })
        .await
        .at(Stage::Persist)?;

        Ok(CaptureReport {
            segment_uri,
            frame,
            frame_bytes,
            removed,
        })
    }
}

impl AttemptRunner for CapturePipeline {
    fn run_attempt(
        self: Arc<Self>,
        ctx: LogContext,
        lease: AttemptLease,
    ) -> BoxFuture<'static, Result<CaptureReport, StageError>> {
        async move { self.capture_leased(&ctx, &lease).await }.boxed()
    }
}

// The job keeps running if the caller is dropped; its lease clone goes with it.
async fn blocking<T, F>(lease: &AttemptLease, f: F) -> CaptureResult<T>
where
    F: FnOnce() -> CaptureResult<T> + Send + 'static,
    T: Send + 'static,
{
    let lease = lease.clone();
    tokio::task::spawn_blocking(move || {
        let _lease = lease;
        f()
    })
    .await
    .map_err(|e| CaptureError::Worker {
        reason: e.to_string(),
    })?
}
