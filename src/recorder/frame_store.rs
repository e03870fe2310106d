// src/recorder/frame_store.rs
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::{CaptureError, CaptureResult, frame_file_name_now};

/// Filesystem layout `<root>/<stream id>/<timestamp>.jpeg`.
#[derive(Debug, Clone)]
pub struct FrameStore {
    root: PathBuf,
}

impl FrameStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn stream_dir(&self, stream_id: &str) -> PathBuf {
        self.root.join(stream_id)
    }

    pub fn ensure_stream_dir(&self, stream_id: &str) -> CaptureResult<PathBuf> {
        let dir = self.stream_dir(stream_id);
        fs::create_dir_all(&dir)
            .map_err(|e| CaptureError::filesystem("can't create path", &dir, e))?;
        Ok(dir)
    }

    /// Writes a new frame file. An existing file of the same name is never
    /// overwritten; that case fails with `AlreadyExists`.
    pub fn persist_frame(&self, stream_id: &str, jpeg: &[u8]) -> CaptureResult<PathBuf> {
        let path = self.ensure_stream_dir(stream_id)?.join(frame_file_name_now());
        write_new(&path, jpeg).map_err(|e| CaptureError::filesystem("can't write frame", &path, e))?;
        Ok(path)
    }
}

fn write_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_writes_jpeg_under_stream_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path());

        let path = store.persist_frame("cam1", b"\xFF\xD8jpeg").unwrap();

        assert_eq!(path.parent().unwrap(), dir.path().join("cam1"));
        assert_eq!(path.extension().unwrap(), "jpeg");
        assert_eq!(fs::read(&path).unwrap(), b"\xFF\xD8jpeg");
    }

    #[test]
    fn unwritable_root_is_a_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let store = FrameStore::new(&blocker);

        let err = store.persist_frame("cam1", b"x").unwrap_err();
        assert!(matches!(err, CaptureError::Filesystem { .. }));
    }

    #[test]
    fn existing_frame_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.jpeg");
        fs::write(&path, b"first").unwrap();

        let err = write_new(&path, b"second").unwrap_err();

        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn back_to_back_frames_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path());

        let first = store.persist_frame("cam1", b"one").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.persist_frame("cam1", b"two").unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert_eq!(fs::read(&second).unwrap(), b"two");
    }
}
