use anyhow::Result;
use image::RgbImage;

use crate::detect::result::{DetectedObject, Label};

/// Thresholds and label set handed to a backend for one call.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectParams {
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    /// Labels the caller cares about. Objects of other labels are dropped.
    pub labels: Vec<Label>,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms_threshold: 0.3,
            labels: Label::ALL.to_vec(),
        }
    }
}

impl DetectParams {
    pub fn accepts(&self, obj: &DetectedObject) -> bool {
        obj.confidence >= self.confidence_threshold && self.labels.contains(&obj.label)
    }
}

/// Detector backend trait.
///
/// Backends own thresholding and non-max suppression. The adapter in front of
/// them only resizes the image and maps coordinates back.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on an RGB image.
    ///
    /// `Ok(None)` means the backend produced no valid result for this image,
    /// which is not the same as `Ok(Some(vec![]))` (nothing in view).
    fn detect(
        &mut self,
        image: &RgbImage,
        params: &DetectParams,
    ) -> Result<Option<Vec<DetectedObject>>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
