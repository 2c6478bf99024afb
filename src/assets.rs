//! Instruction asset lookup.
//!
//! Images live in a local directory and are referenced by path; videos are
//! streamed from a URL prefix. A missing image never blocks an instruction:
//! the reply goes out without it and names it in `missing_assets`.

use std::path::PathBuf;

use crate::config::AssetSettings;
use crate::guidance::{Cue, Instruction, Status, StepOutcome};

pub struct AssetResolver {
    settings: AssetSettings,
}

impl AssetResolver {
    pub fn new(settings: AssetSettings) -> Self {
        Self { settings }
    }

    /// Path of an instructional image, if it exists on disk.
    pub fn resolve_image(&self, name: &str) -> Option<PathBuf> {
        let path = self.settings.image_dir.join(name);
        path.is_file().then_some(path)
    }

    /// Streaming reference for an instructional clip, when video guidance is on.
    pub fn video_ref(&self, name: &str) -> Option<String> {
        self.settings
            .video_guidance
            .then(|| format!("{}{}", self.settings.video_url_prefix, name))
    }

    pub fn instruction_for(&self, outcome: &StepOutcome) -> Instruction {
        match outcome.cue() {
            Some(cue) => self.instruction_from_cue(cue),
            None => Instruction::unchanged(),
        }
    }

    pub fn instruction_from_cue(&self, cue: &Cue) -> Instruction {
        let mut missing_assets = Vec::new();
        let image = match self.resolve_image(cue.image) {
            Some(path) => Some(path.to_string_lossy().into_owned()),
            None => {
                log::warn!(
                    "instruction image {} not found under {}",
                    cue.image,
                    self.settings.image_dir.display()
                );
                missing_assets.push(cue.image.to_string());
                None
            }
        };
        Instruction {
            status: Status::Success,
            speech: Some(cue.speech.to_string()),
            image,
            video: self.video_ref(cue.video),
            missing_assets,
        }
    }
}
