use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Failures inside one capture attempt. None of them is fatal to the process;
/// the attempt for that stream ends and the next cycle is the retry.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("invalid status code {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("bad playlist from {url}: {reason}")]
    PlaylistFormat { url: String, reason: String },
    #[error("segment {url} exceeds {limit} bytes")]
    PayloadTooLarge { url: String, limit: u64 },
    #[error("frame extraction failed: {reason}")]
    Extraction { reason: String },
    #[error("worker task failed: {reason}")]
    Worker { reason: String },
    #[error("{context} {path:?}: {source}")]
    Filesystem {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    pub fn transport(
        url: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn playlist(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlaylistFormat {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::Extraction {
            reason: reason.into(),
        }
    }

    pub fn filesystem(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            context,
            path: path.into(),
            source,
        }
    }
}

/// Step of a capture attempt, used to tag failures in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Resolve,
    Fetch,
    Extract,
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: CaptureError,
}

impl StageError {
    pub fn new(stage: Stage, source: CaptureError) -> Self {
        Self { stage, source }
    }
}

/// Extension to tag a stage result with the stage it came from.
pub trait StageContext<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T> StageContext<T> for CaptureResult<T> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{message}")]
    Message { message: String },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ConfigError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
