// src/recorder/retention_fs.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use log::{debug, warn};

use super::{FrameStore, RetentionPolicy};
use crate::config::{RetentionConfig, RetentionKind};
use crate::core::{CaptureError, CaptureResult, FRAME_EXTENSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Keeps the `keep` most recently modified frames.
#[derive(Debug, Clone)]
pub struct KeepNewest {
    keep: usize,
}

impl KeepNewest {
    pub fn new(keep: usize) -> Self {
        Self { keep: keep.max(1) }
    }
}

impl RetentionPolicy for KeepNewest {
    fn name(&self) -> &'static str {
        "keep_newest"
    }

    fn expired<'a>(&self, frames: &'a [FrameEntry], _protected: Option<&Path>) -> Vec<&'a FrameEntry> {
        let cut = frames.len().saturating_sub(self.keep);
        frames[..cut].iter().collect()
    }
}

/// Keeps only the frame that was just written.
#[derive(Debug, Clone, Default)]
pub struct KeepNamed;

impl RetentionPolicy for KeepNamed {
    fn name(&self) -> &'static str {
        "keep_named"
    }

    fn expired<'a>(&self, frames: &'a [FrameEntry], protected: Option<&Path>) -> Vec<&'a FrameEntry> {
        match protected {
            Some(keep) => frames.iter().filter(|f| f.path != keep).collect(),
            None => Vec::new(),
        }
    }
}

/// Lists `.jpeg` frames of a directory, oldest first (mtime, then name).
pub fn list_frames(dir: &Path) -> std::io::Result<Vec<FrameEntry>> {
    let mut frames = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let is_frame = path
            .extension()
            .is_some_and(|ext| ext == FRAME_EXTENSION);
        if !is_frame {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            // vanished between listing and stat
            Err(_) => continue,
        };

        frames.push(FrameEntry {
            path,
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    frames.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(frames)
}

#[derive(Clone)]
pub struct RetentionManager {
    store: FrameStore,
    policy: Arc<dyn RetentionPolicy>,
}

impl RetentionManager {
    pub fn new(store: FrameStore, policy: Arc<dyn RetentionPolicy>) -> Self {
        Self { store, policy }
    }

    pub fn from_config(store: FrameStore, cfg: &RetentionConfig) -> Self {
        let policy: Arc<dyn RetentionPolicy> = match cfg.policy {
            RetentionKind::KeepNewest => Arc::new(KeepNewest::new(cfg.keep_frames)),
            RetentionKind::KeepNamed => Arc::new(KeepNamed),
        };
        Self::new(store, policy)
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Deletes expired frames of one stream and returns how many were removed.
    /// A listing failure aborts cleanup for this stream only; single removal
    /// failures are logged and skipped.
    pub fn enforce_retention(
        &self,
        stream_id: &str,
        protected: Option<&Path>,
    ) -> CaptureResult<usize> {
        let dir = self.store.stream_dir(stream_id);
        let frames = list_frames(&dir)
            .map_err(|e| CaptureError::filesystem("can't list frames in", &dir, e))?;

        let mut removed = 0;
        for frame in self.policy.expired(&frames, protected) {
            match fs::remove_file(&frame.path) {
                Ok(()) => {
                    debug!("[retention] removed {:?}", frame.path);
                    removed += 1;
                }
                Err(err) => {
                    warn!("[retention] failed {:?}: {}", frame.path, err);
                }
            }
        }

        Ok(removed)
    }
}
