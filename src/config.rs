use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{DetectParams, Label};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:2722";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1;
const DEFAULT_MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;
const DEFAULT_BACKEND: &str = "scripted";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_NMS_THRESHOLD: f32 = 0.3;
const DEFAULT_IMAGE_MAX_WH: u32 = 640;
const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;
const DEFAULT_IMAGE_DIR: &str = "images";

const ENV_KEYS: &[&str] = &[
    "GUIDE_LISTEN_ADDR",
    "GUIDE_POLL_INTERVAL_MS",
    "GUIDE_MAX_FRAME_BYTES",
    "GUIDE_BACKEND",
    "GUIDE_CONFIDENCE_THRESHOLD",
    "GUIDE_NMS_THRESHOLD",
    "GUIDE_IMAGE_MAX_WH",
    "GUIDE_LABELS",
    "GUIDE_MODEL_PATH",
    "GUIDE_SCRIPT_PATH",
    "GUIDE_IMAGE_DIR",
    "GUIDE_VIDEO_URL_PREFIX",
    "GUIDE_VIDEO_GUIDANCE",
];

#[derive(Debug, Deserialize, Default)]
struct GuideConfigFile {
    server: Option<ServerConfigFile>,
    detector: Option<DetectorConfigFile>,
    assets: Option<AssetConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerConfigFile {
    addr: Option<String>,
    poll_interval_ms: Option<u64>,
    max_frame_bytes: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    image_max_wh: Option<u32>,
    labels: Option<Vec<String>>,
    model_path: Option<PathBuf>,
    model_input_size: Option<u32>,
    script_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct AssetConfigFile {
    image_dir: Option<PathBuf>,
    video_url_prefix: Option<String>,
    video_guidance: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct GuideConfig {
    pub server: ServerSettings,
    pub detector: DetectorSettings,
    pub assets: AssetSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: String,
    pub poll_interval: Duration,
    pub max_frame_bytes: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub image_max_wh: u32,
    pub labels: Vec<Label>,
    pub model_path: Option<PathBuf>,
    pub model_input_size: u32,
    pub script_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub image_dir: PathBuf,
    pub video_url_prefix: String,
    pub video_guidance: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_LISTEN_ADDR.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            video_url_prefix: String::new(),
            video_guidance: false,
        }
    }
}

impl DetectorSettings {
    pub fn detect_params(&self) -> DetectParams {
        DetectParams {
            confidence_threshold: self.confidence_threshold,
            nms_threshold: self.nms_threshold,
            labels: self.labels.clone(),
        }
    }
}

impl GuideConfig {
    /// Load from the file named by `GUIDE_CONFIG` (if set), then the environment.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("GUIDE_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit config file (if any), then the environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Environment variables consulted by `apply_env`.
    pub fn env_keys() -> &'static [&'static str] {
        ENV_KEYS
    }

    fn from_file(file: GuideConfigFile) -> Result<Self> {
        let server = file.server.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let assets = file.assets.unwrap_or_default();

        let labels = match detector.labels {
            Some(names) => parse_labels(names.iter().map(String::as_str))?,
            None => Label::ALL.to_vec(),
        };

        Ok(Self {
            server: ServerSettings {
                addr: server
                    .addr
                    .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
                poll_interval: Duration::from_millis(
                    server.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                ),
                max_frame_bytes: server.max_frame_bytes.unwrap_or(DEFAULT_MAX_FRAME_BYTES),
            },
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                nms_threshold: detector.nms_threshold.unwrap_or(DEFAULT_NMS_THRESHOLD),
                image_max_wh: detector.image_max_wh.unwrap_or(DEFAULT_IMAGE_MAX_WH),
                labels,
                model_path: detector.model_path,
                model_input_size: detector
                    .model_input_size
                    .unwrap_or(DEFAULT_MODEL_INPUT_SIZE),
                script_path: detector.script_path,
            },
            assets: AssetSettings {
                image_dir: assets
                    .image_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR)),
                video_url_prefix: assets.video_url_prefix.unwrap_or_default(),
                video_guidance: assets.video_guidance.unwrap_or(false),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = env_non_empty("GUIDE_LISTEN_ADDR") {
            self.server.addr = addr;
        }
        if let Some(ms) = env_non_empty("GUIDE_POLL_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| anyhow!("GUIDE_POLL_INTERVAL_MS must be an integer number of milliseconds"))?;
            self.server.poll_interval = Duration::from_millis(ms);
        }
        if let Some(bytes) = env_non_empty("GUIDE_MAX_FRAME_BYTES") {
            self.server.max_frame_bytes = bytes
                .parse()
                .map_err(|_| anyhow!("GUIDE_MAX_FRAME_BYTES must be an integer byte count"))?;
        }
        if let Some(backend) = env_non_empty("GUIDE_BACKEND") {
            self.detector.backend = backend;
        }
        if let Some(value) = env_non_empty("GUIDE_CONFIDENCE_THRESHOLD") {
            self.detector.confidence_threshold = value
                .parse()
                .map_err(|_| anyhow!("GUIDE_CONFIDENCE_THRESHOLD must be a number"))?;
        }
        if let Some(value) = env_non_empty("GUIDE_NMS_THRESHOLD") {
            self.detector.nms_threshold = value
                .parse()
                .map_err(|_| anyhow!("GUIDE_NMS_THRESHOLD must be a number"))?;
        }
        if let Some(value) = env_non_empty("GUIDE_IMAGE_MAX_WH") {
            self.detector.image_max_wh = value
                .parse()
                .map_err(|_| anyhow!("GUIDE_IMAGE_MAX_WH must be an integer pixel count"))?;
        }
        if let Ok(labels) = std::env::var("GUIDE_LABELS") {
            let parsed = parse_labels(split_csv(&labels).iter().map(String::as_str))?;
            if !parsed.is_empty() {
                self.detector.labels = parsed;
            }
        }
        if let Some(path) = env_non_empty("GUIDE_MODEL_PATH") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_non_empty("GUIDE_SCRIPT_PATH") {
            self.detector.script_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = env_non_empty("GUIDE_IMAGE_DIR") {
            self.assets.image_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("GUIDE_VIDEO_URL_PREFIX") {
            self.assets.video_url_prefix = prefix;
        }
        if let Some(flag) = env_non_empty("GUIDE_VIDEO_GUIDANCE") {
            self.assets.video_guidance = parse_bool(&flag)
                .ok_or_else(|| anyhow!("GUIDE_VIDEO_GUIDANCE must be true or false"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (name, value) in [
            ("confidence_threshold", self.detector.confidence_threshold),
            ("nms_threshold", self.detector.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.detector.image_max_wh == 0 {
            return Err(anyhow!("image_max_wh must be greater than zero"));
        }
        if self.detector.model_input_size == 0 {
            return Err(anyhow!("model_input_size must be greater than zero"));
        }
        let poll_ms = self.server.poll_interval.as_millis();
        if !(1..=1000).contains(&poll_ms) {
            return Err(anyhow!(
                "poll_interval_ms must be between 1 and 1000, got {}",
                poll_ms
            ));
        }
        if self.server.max_frame_bytes == 0 {
            return Err(anyhow!("max_frame_bytes must be greater than zero"));
        }
        if self.detector.labels.is_empty() {
            return Err(anyhow!("at least one detector label is required"));
        }
        self.detector.labels.sort();
        self.detector.labels.dedup();
        self.detector.backend = self.detector.backend.trim().to_lowercase();
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("the tract backend requires detector.model_path"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<GuideConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_labels<'a>(names: impl Iterator<Item = &'a str>) -> Result<Vec<Label>> {
    names.map(str::parse::<Label>).collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
