//! One request, end to end: decode the payload, detect, step the shared
//! session and turn the outcome into a reply.

use image::DynamicImage;

use crate::assets::AssetResolver;
use crate::detect::{DetectedObject, DetectionAdapter};
use crate::frame::Frame;
use crate::guidance::{GuidanceSession, Instruction, SharedSession, StepOutcome};

/// Literal reply when there is nothing actionable for a frame.
pub const NO_RESULT: &str = "None";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// The detector had no valid result.
    NoResult,
    Instruction(Instruction),
}

impl Reply {
    /// UTF-8 payload written back to the client.
    pub fn to_payload(&self) -> anyhow::Result<Vec<u8>> {
        match self {
            Reply::NoResult => Ok(NO_RESULT.as_bytes().to_vec()),
            Reply::Instruction(instruction) => Ok(instruction.to_json()?.into_bytes()),
        }
    }
}

pub struct FramePipeline {
    adapter: DetectionAdapter,
    session: SharedSession,
    assets: AssetResolver,
}

impl FramePipeline {
    pub fn new(adapter: DetectionAdapter, session: SharedSession, assets: AssetResolver) -> Self {
        Self {
            adapter,
            session,
            assets,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Handle one encoded image payload.
    ///
    /// A payload that is not an image counts as a frame with nothing in view.
    pub fn handle(&self, payload: &[u8]) -> Reply {
        match Frame::decode(payload) {
            Ok(image) => self.handle_image(image),
            Err(err) => {
                log::debug!("undecodable frame ({} bytes): {:#}", payload.len(), err);
                self.step_session(|session| session.step_unreadable())
            }
        }
    }

    pub fn handle_image(&self, image: DynamicImage) -> Reply {
        match self.adapter.detect(image) {
            Ok(Some(objects)) => self.advance(&objects),
            Ok(None) => Reply::NoResult,
            Err(err) => {
                log::warn!("detector failed: {:#}", err);
                Reply::Instruction(Instruction::error())
            }
        }
    }

    /// Step the session with an already detected object list.
    pub fn advance(&self, objects: &[DetectedObject]) -> Reply {
        let reply = self.step_session(|session| session.step(objects));
        log::debug!("{} objects in frame", objects.len());
        reply
    }

    fn step_session(&self, step: impl FnOnce(&mut GuidanceSession) -> StepOutcome) -> Reply {
        let outcome = match self.session.lock() {
            Ok(mut session) => step(&mut session),
            Err(_) => {
                log::error!("guidance session lock poisoned");
                return Reply::Instruction(Instruction::error());
            }
        };
        log::debug!("state {} after step", outcome.state());
        Reply::Instruction(self.assets.instruction_for(&outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetSettings;
    use crate::detect::{DetectParams, Label, ScriptedBackend, SharedBackend};
    use crate::guidance::{GuidanceSession, GuidanceState, Status};
    use image::RgbImage;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn pipeline(frames: Vec<Option<Vec<DetectedObject>>>) -> FramePipeline {
        let backend: SharedBackend = Arc::new(Mutex::new(ScriptedBackend::from_frames(frames)));
        let adapter = DetectionAdapter::new(backend, DetectParams::default(), 640);
        FramePipeline::new(
            adapter,
            GuidanceSession::new().shared(),
            AssetResolver::new(AssetSettings::default()),
        )
    }

    fn png() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn undecodable_payload_before_start_is_a_no_op() {
        let pipeline = pipeline(vec![]);
        assert_eq!(
            pipeline.handle(b"not an image"),
            Reply::Instruction(Instruction::unchanged())
        );
        assert_eq!(
            pipeline.session().lock().unwrap().state(),
            GuidanceState::Start
        );
    }

    #[test]
    fn undecodable_payload_breaks_a_streak() {
        let tray = DetectedObject::new(Label::Tray, [0.0, 0.0, 4.0, 6.0], 0.9);
        let pipeline = pipeline(vec![Some(vec![tray])]);
        *pipeline.session().lock().unwrap() = GuidanceSession::resume_at(GuidanceState::Nothing);

        pipeline.handle(&png());
        pipeline.handle(&png());
        let reply = pipeline.handle(b"garbage");
        assert_eq!(reply.to_payload().unwrap(), br#"{"status":"success"}"#.to_vec());
        assert_eq!(pipeline.session().lock().unwrap().counter(Label::Tray), 0);

        pipeline.handle(&png());
        let session = pipeline.session().lock().unwrap();
        assert_eq!(session.counter(Label::Tray), 1);
        assert_eq!(session.state(), GuidanceState::Nothing);
    }

    #[test]
    fn detector_without_result_replies_none() {
        let pipeline = pipeline(vec![None]);
        let reply = pipeline.handle(&png());
        assert_eq!(reply, Reply::NoResult);
        assert_eq!(reply.to_payload().unwrap(), b"None".to_vec());
        assert_eq!(
            pipeline.session().lock().unwrap().state(),
            GuidanceState::Start
        );
    }

    #[test]
    fn first_frame_yields_tray_instruction() {
        let tray = DetectedObject::new(Label::Tray, [0.0, 0.0, 4.0, 6.0], 0.9);
        let pipeline = pipeline(vec![Some(vec![tray])]);
        let Reply::Instruction(instruction) = pipeline.handle(&png()) else {
            panic!("expected an instruction");
        };
        assert_eq!(instruction.status, Status::Success);
        assert_eq!(instruction.speech.as_deref(), Some("Put the tray on the table."));
        assert_eq!(instruction.missing_assets, vec!["tray.jpg".to_string()]);
    }
}
