// src/recorder/mod.rs

use std::path::Path;

pub mod frame_store;
pub mod retention_fs;

pub use frame_store::FrameStore;
pub use retention_fs::{FrameEntry, KeepNamed, KeepNewest, RetentionManager, list_frames};

/// Decides which stored frames of one stream are expired.
pub trait RetentionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `frames` is ordered oldest first. `protected` is the frame written by
    /// the current attempt, if any.
    fn expired<'a>(&self, frames: &'a [FrameEntry], protected: Option<&Path>) -> Vec<&'a FrameEntry>;
}
