use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::nms::non_max_suppression;
use crate::detect::result::DetectedObject;

/// Backend that replays a fixed sequence of detection frames.
///
/// Script format is JSON lines: each line is an array of objects
/// (`{"x1":..,"y1":..,"x2":..,"y2":..,"confidence":..,"label":"tray"}`) or
/// `null` for a frame the detector could not process. Blank lines and lines
/// starting with `#` are ignored. The script loops once exhausted.
///
/// Image content is ignored; every call consumes one scripted frame.
#[derive(Default)]
pub struct ScriptedBackend {
    frames: Vec<Option<Vec<DetectedObject>>>,
    cursor: usize,
}

impl ScriptedBackend {
    /// An empty script: every frame reports nothing in view.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: Vec<Option<Vec<DetectedObject>>>) -> Self {
        Self { frames, cursor: 0 }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid detection script {}", path.display()))
    }

    pub fn parse(script: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for (lineno, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let frame: Option<Vec<DetectedObject>> = serde_json::from_str(line)
                .map_err(|e| anyhow!("line {}: {}", lineno + 1, e))?;
            frames.push(frame);
        }
        Ok(Self::from_frames(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(
        &mut self,
        _image: &RgbImage,
        params: &DetectParams,
    ) -> Result<Option<Vec<DetectedObject>>> {
        if self.frames.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();

        Ok(frame.map(|objects| {
            let mut kept: Vec<DetectedObject> =
                objects.into_iter().filter(|obj| params.accepts(obj)).collect();
            non_max_suppression(&mut kept, params.nms_threshold);
            kept
        }))
    }
}
