#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use frametap::config::{self, ExtractorConfig, StreamConfig};
use frametap::testing::mocks::MockHlsServer;

pub fn media_playlist(segments: &[&str]) -> Vec<u8> {
    let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n#EXT-X-MEDIA-SEQUENCE:1\n");
    for seg in segments {
        body.push_str("#EXTINF:2.000,\n");
        body.push_str(seg);
        body.push('\n');
    }
    body.into_bytes()
}

pub fn stream_config(
    server: &MockHlsServer,
    output_dir: &Path,
    extractor: ExtractorConfig,
    clean_up: bool,
) -> StreamConfig {
    let text = format!(
        "url_template = \"{}/%s/\"\ncamera_ids = [\"cam1\"]\npoll_interval_secs = 1\nclean_up = {}\n",
        server.base_url(),
        clean_up
    );
    let mut raw = config::parse(&text, false).expect("parse test config");
    raw.output_dir = output_dir.to_string_lossy().into_owned();
    raw.extractor = extractor;
    raw.validate().expect("valid test config")
}

pub fn old_frame(dir: &Path, name: &str) -> PathBuf {
    std::fs::create_dir_all(dir).expect("create stream dir");
    let path = dir.join(name);
    let file = File::create(&path).expect("create old frame");
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000))
        .expect("set mtime");
    path
}

pub fn jpeg_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "jpeg"))
        .collect();
    files.sort();
    files
}
