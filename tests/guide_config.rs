use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::Builder;

use assembly_guide::{GuideConfig, Label};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    std::env::remove_var("GUIDE_CONFIG");
    for key in GuideConfig::env_keys() {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    let json = r#"{
        "server": { "addr": "127.0.0.1:9100", "poll_interval_ms": 5 },
        "detector": {
            "confidence_threshold": 0.6,
            "labels": ["pin", "tray", "pin"],
            "image_max_wh": 480
        },
        "assets": { "image_dir": "/srv/guide/images", "video_guidance": true }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("GUIDE_CONFIG", file.path());
    std::env::set_var("GUIDE_NMS_THRESHOLD", "0.45");
    std::env::set_var("GUIDE_VIDEO_URL_PREFIX", "http://media.local/");

    let cfg = GuideConfig::load().expect("load config");

    assert_eq!(cfg.server.addr, "127.0.0.1:9100");
    assert_eq!(cfg.server.poll_interval, Duration::from_millis(5));
    assert_eq!(cfg.detector.confidence_threshold, 0.6);
    assert_eq!(cfg.detector.nms_threshold, 0.45);
    assert_eq!(cfg.detector.image_max_wh, 480);
    assert_eq!(cfg.detector.labels, vec![Label::Tray, Label::Pin]);
    assert_eq!(cfg.assets.image_dir.to_str(), Some("/srv/guide/images"));
    assert!(cfg.assets.video_guidance);
    assert_eq!(cfg.assets.video_url_prefix, "http://media.local/");

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
[server]
addr = "0.0.0.0:2800"
max_frame_bytes = 1048576

[detector]
backend = "Scripted"
nms_threshold = 0.25
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = GuideConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.server.addr, "0.0.0.0:2800");
    assert_eq!(cfg.server.max_frame_bytes, 1024 * 1024);
    assert_eq!(cfg.detector.backend, "scripted");
    assert_eq!(cfg.detector.nms_threshold, 0.25);
    assert_eq!(cfg.detector.confidence_threshold, 0.5);
    assert_eq!(cfg.detector.labels, Label::ALL.to_vec());
}

#[test]
fn env_labels_replace_file_labels() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("GUIDE_LABELS", " clamped , slotpin ");
    let cfg = GuideConfig::load_from(None).expect("load config");
    assert_eq!(cfg.detector.labels, vec![Label::SlotPin, Label::Clamped]);

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("GUIDE_CONFIDENCE_THRESHOLD", "high");
    assert!(GuideConfig::load_from(None).is_err());
    clear_env();

    std::env::set_var("GUIDE_POLL_INTERVAL_MS", "0");
    let err = GuideConfig::load_from(None).unwrap_err();
    assert!(err.to_string().contains("poll_interval_ms"));
    clear_env();

    std::env::set_var("GUIDE_VIDEO_GUIDANCE", "sometimes");
    assert!(GuideConfig::load_from(None).is_err());
    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("temp dir");
    let err = GuideConfig::load_from(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}
