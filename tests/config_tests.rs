use std::path::{Path, PathBuf};
use std::time::Duration;

use frametap::config::{self, RetentionKind};

#[test]
fn example_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.toml");
    let cfg = config::load(&path).expect("example config is valid");

    assert_eq!(cfg.stream_ids, vec!["entrance", "parking", "yard"]);
    assert_eq!(cfg.poll_interval, Duration::from_secs(60));
    assert_eq!(cfg.attempt_timeout, cfg.poll_interval);
    assert!(cfg.clean_up);
    assert_eq!(cfg.output_dir, PathBuf::from("/var/lib/frametap"));
    assert_eq!(cfg.retention.policy, RetentionKind::KeepNewest);
    assert_eq!(cfg.monitoring.http_port, Some(9105));
    assert_eq!(
        cfg.url_template.resolve("yard"),
        "https://cams.internal/hls/yard/"
    );
}

#[test]
fn original_json_layout_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "url_template": "https://10.1.1.1/cams/%s/",
            "camera_ids": ["1", "2"],
            "timeout": 0,
            "clean_up": false,
            "dir_name": ""
        }"#,
    )
    .unwrap();

    let cfg = config::load(&path).unwrap();
    assert_eq!(cfg.poll_interval, Duration::from_secs(60));
    assert_eq!(cfg.output_dir, PathBuf::from("./"));
    assert!(!cfg.clean_up);
}

#[test]
fn invalid_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "url_template = \"http://x/%s/\"\ncamera_ids = []\n").unwrap();

    let err = config::load(&path).unwrap_err();
    assert!(err.to_string().contains("camera_ids is required"));

    std::fs::write(&path, "url_template = [").unwrap();
    assert!(config::load(&path).unwrap_err().to_string().contains("invalid TOML"));
}
