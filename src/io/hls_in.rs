use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::debug;
use m3u8_rs::Playlist;

use crate::config::{HttpConfig, StreamConfig, UrlTemplate};
use crate::core::{CaptureError, CaptureResult};
use crate::recorder::FrameStore;

pub const PLAYLIST_NAME: &str = "index.m3u8";

/// Resolves the current media segment of a stream and downloads it.
///
/// All calls block; callers on the async runtime run them through
/// `spawn_blocking`.
#[derive(Clone)]
pub struct SegmentFetcher {
    agent: ureq::Agent,
    template: UrlTemplate,
    store: FrameStore,
    max_segment_bytes: u64,
}

impl SegmentFetcher {
    pub fn new(
        agent: ureq::Agent,
        template: UrlTemplate,
        store: FrameStore,
        max_segment_bytes: u64,
    ) -> Self {
        Self {
            agent,
            template,
            store,
            max_segment_bytes,
        }
    }

    pub fn from_config(cfg: &StreamConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            build_agent(&cfg.http, cfg.attempt_timeout)?,
            cfg.url_template.clone(),
            FrameStore::new(&cfg.output_dir),
            cfg.max_segment_bytes,
        ))
    }

    pub fn playlist_url(&self, stream_id: &str) -> String {
        format!("{}{}", self.template.resolve(stream_id), PLAYLIST_NAME)
    }

    pub fn segment_url(&self, stream_id: &str, segment_uri: &str) -> String {
        if segment_uri.starts_with("http://") || segment_uri.starts_with("https://") {
            return segment_uri.to_string();
        }
        format!("{}{}", self.template.resolve(stream_id), segment_uri)
    }

    pub fn resolve_latest_segment(&self, stream_id: &str) -> CaptureResult<String> {
        let url = self.playlist_url(stream_id);
        let response = self.get(&url)?;

        let body = response
            .into_string()
            .map_err(|e| CaptureError::transport(&url, e))?;

        let uri = parse_first_segment(body.as_bytes()).map_err(|reason| CaptureError::playlist(&url, reason))?;
        debug!("[hls_in] {} latest segment {}", stream_id, uri);
        Ok(uri)
    }

    pub fn fetch_segment(&self, stream_id: &str, segment_uri: &str) -> CaptureResult<Bytes> {
        let url = self.segment_url(stream_id, segment_uri);
        let response = self.get(&url)?;

        self.store.ensure_stream_dir(stream_id)?;

        let mut buf = Vec::new();
        response
            .into_reader()
            .take(self.max_segment_bytes + 1)
            .read_to_end(&mut buf)
            .map_err(|e| CaptureError::transport(&url, e))?;

        if buf.len() as u64 > self.max_segment_bytes {
            return Err(CaptureError::PayloadTooLarge {
                url,
                limit: self.max_segment_bytes,
            });
        }

        debug!("[hls_in] {} fetched {} ({} bytes)", stream_id, segment_uri, buf.len());
        Ok(Bytes::from(buf))
    }

    fn get(&self, url: &str) -> CaptureResult<ureq::Response> {
        match self.agent.get(url).call() {
            Ok(response) if response.status() == 200 => Ok(response),
            Ok(response) => Err(CaptureError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            }),
            Err(ureq::Error::Status(status, _)) => Err(CaptureError::HttpStatus {
                url: url.to_string(),
                status,
            }),
            Err(ureq::Error::Transport(t)) => Err(CaptureError::transport(url, t)),
        }
    }
}

/// HTTP agent for stream endpoints; with `insecure_tls` certificates and host
/// names are not verified.
///
/// `deadline` bounds each whole request, body included, so a download never
/// outlives the attempt that started it by more than one deadline.
pub fn build_agent(cfg: &HttpConfig, deadline: Duration) -> anyhow::Result<ureq::Agent> {
    let mut builder = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(cfg.connect_timeout_secs))
        .timeout_read(Duration::from_secs(cfg.read_timeout_secs))
        .timeout(deadline);

    if cfg.insecure_tls {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        builder = builder.tls_connector(Arc::new(connector));
    }

    Ok(builder.build())
}

/// URI of the first segment of a media playlist.
pub fn parse_first_segment(body: &[u8]) -> Result<String, String> {
    match m3u8_rs::parse_playlist_res(body) {
        Ok(Playlist::MediaPlaylist(playlist)) => {
            let first = playlist
                .segments
                .first()
                .ok_or_else(|| "playlist has no segments".to_string())?;
            let uri = first.uri.trim();
            if uri.is_empty() {
                return Err("first segment has no uri".to_string());
            }
            Ok(uri.to_string())
        }
        Ok(Playlist::MasterPlaylist(_)) => Err("wrong playlist type".to_string()),
        Err(_) => Err("body is not an m3u8 playlist".to_string()),
    }
}
