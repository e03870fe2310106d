use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::ConfigError;

pub const PLACEHOLDER: &str = "%s";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_OUTPUT_DIR: &str = "./";
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 32 * 1024 * 1024;

// ---------- HTTP ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub insecure_tls: bool,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            insecure_tls: true,
            connect_timeout_secs: 5,
            read_timeout_secs: 10,
        }
    }
}

// ---------- Extractor ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ExtractorConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            args: [
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-c:v",
                "mjpeg",
                "pipe:1",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ---------- Retention ----------
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionKind {
    #[default]
    KeepNewest,
    KeepNamed,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub policy: RetentionKind,
    pub keep_frames: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            policy: RetentionKind::KeepNewest,
            keep_frames: 1,
        }
    }
}

// ---------- Monitoring ----------
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub http_port: Option<u16>,
}

// ---------- Root (as written on disk) ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RawConfig {
    #[serde(default)]
    pub url_template: String,
    #[serde(default)]
    pub camera_ids: Vec<String>,
    #[serde(default, alias = "timeout")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub clean_up: bool,
    #[serde(default, alias = "dir_name")]
    pub output_dir: String,
    #[serde(default)]
    pub attempt_timeout_secs: u64,
    #[serde(default)]
    pub max_segment_bytes: Option<u64>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// URL pattern with a single `%s` slot for the stream identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        if template.is_empty() {
            return Err(ConfigError::message("url_template is required"));
        }
        match template.matches(PLACEHOLDER).count() {
            1 => Ok(Self(template.to_string())),
            n => Err(ConfigError::message(format!(
                "url_template must contain exactly one '{}' placeholder, found {}",
                PLACEHOLDER, n
            ))),
        }
    }

    /// Base URL for a stream; playlist and segment names are appended to it.
    /// The id is percent-encoded so it always forms a single path segment.
    pub fn resolve(&self, stream_id: &str) -> String {
        self.0.replacen(PLACEHOLDER, &urlencoding::encode(stream_id), 1)
    }
}

/// Validated, immutable process-wide settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url_template: UrlTemplate,
    pub stream_ids: Vec<String>,
    pub poll_interval: Duration,
    pub attempt_timeout: Duration,
    pub clean_up: bool,
    pub output_dir: PathBuf,
    pub max_segment_bytes: u64,
    pub http: HttpConfig,
    pub extractor: ExtractorConfig,
    pub retention: RetentionConfig,
    pub monitoring: MonitoringConfig,
}

impl RawConfig {
    pub fn validate(self) -> Result<StreamConfig, ConfigError> {
        let url_template = UrlTemplate::parse(&self.url_template)?;

        if self.camera_ids.is_empty() {
            return Err(ConfigError::message("camera_ids is required"));
        }
        let mut seen = HashSet::new();
        for id in &self.camera_ids {
            validate_stream_id(id)?;
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::message(format!(
                    "duplicate camera id '{}'",
                    id
                )));
            }
        }

        let poll_secs = match self.poll_interval_secs {
            0 => DEFAULT_POLL_INTERVAL_SECS,
            n => n,
        };
        let attempt_secs = match self.attempt_timeout_secs {
            0 => poll_secs,
            n => n,
        };
        let output_dir = if self.output_dir.is_empty() {
            PathBuf::from(DEFAULT_OUTPUT_DIR)
        } else {
            PathBuf::from(&self.output_dir)
        };

        let mut retention = self.retention;
        retention.keep_frames = retention.keep_frames.max(1);

        if self.extractor.program.is_empty() {
            return Err(ConfigError::message("extractor.program must not be empty"));
        }

        Ok(StreamConfig {
            url_template,
            stream_ids: self.camera_ids,
            poll_interval: Duration::from_secs(poll_secs),
            attempt_timeout: Duration::from_secs(attempt_secs),
            clean_up: self.clean_up,
            output_dir,
            max_segment_bytes: self.max_segment_bytes.unwrap_or(DEFAULT_MAX_SEGMENT_BYTES),
            http: self.http,
            extractor: self.extractor,
            retention,
            monitoring: self.monitoring,
        })
    }
}

// Stream ids become directory names under output_dir.
fn validate_stream_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::message("camera id must not be empty"));
    }
    if id == "." || id == ".." || id.contains('/') || id.contains('\\') {
        return Err(ConfigError::message(format!(
            "camera id '{}' is not a valid directory name",
            id
        )));
    }
    Ok(())
}

// ---------- Loader ----------
pub fn parse(text: &str, json: bool) -> Result<RawConfig, ConfigError> {
    if json {
        serde_json::from_str(text).map_err(|e| ConfigError::with_context("invalid JSON config", e))
    } else {
        toml::from_str(text).map_err(|e| ConfigError::with_context("invalid TOML config", e))
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<StreamConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::with_context(format!("failed to read {}", path.display()), e))?;
    let json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    parse(&text, json)?.validate()
}
