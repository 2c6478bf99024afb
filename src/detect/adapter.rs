use std::time::Instant;

use anyhow::{anyhow, Result};
use image::DynamicImage;

use crate::detect::backend::DetectParams;
use crate::detect::registry::SharedBackend;
use crate::detect::result::DetectedObject;
use crate::frame::Frame;

/// Fronts a detector backend: shrinks oversized images and maps the boxes
/// back to original-image coordinates. Thresholds pass through untouched.
pub struct DetectionAdapter {
    backend: SharedBackend,
    params: DetectParams,
    image_max_wh: u32,
}

impl DetectionAdapter {
    pub fn new(backend: SharedBackend, params: DetectParams, image_max_wh: u32) -> Self {
        Self {
            backend,
            params,
            image_max_wh,
        }
    }

    /// Detect objects in `image`.
    ///
    /// Returns `Ok(None)` when the backend has no valid result for this image.
    pub fn detect(&self, image: DynamicImage) -> Result<Option<Vec<DetectedObject>>> {
        let frame = Frame::prepare(image, self.image_max_wh);
        let started = Instant::now();
        let found = {
            let mut guard = self
                .backend
                .lock()
                .map_err(|_| anyhow!("detector backend lock poisoned"))?;
            guard.detect(frame.image(), &self.params)?
        };
        log::debug!(
            "detection took {:.2} ms",
            started.elapsed().as_secs_f64() * 1000.0
        );

        let ratio = frame.resize_ratio();
        Ok(found.map(|objects| {
            if ratio == 1.0 {
                objects
            } else {
                objects.iter().map(|obj| obj.rescaled(ratio)).collect()
            }
        }))
    }
}
