#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::nms::non_max_suppression;
use crate::detect::result::{DetectedObject, Label};

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// The model takes a `[1, 3, S, S]` RGB tensor in `0..1` and emits
/// `[1, 4 + C, N]` rows of `(cx, cy, w, h, class scores...)`. Class index `i`
/// maps to `Label::from_index(i)`.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let side = self.input_size;
        let resized = image::imageops::resize(image, side, side, FilterType::Triangle);
        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        input.into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        image: &RgbImage,
        params: &DetectParams,
    ) -> Result<Vec<DetectedObject>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let classes = shape[1] - 4;
        let anchors = shape[2];
        let sx = image.width() as f32 / self.input_size as f32;
        let sy = image.height() as f32 / self.input_size as f32;

        let mut objects = Vec::new();
        for a in 0..anchors {
            let (class_idx, score) = (0..classes)
                .map(|c| (c, view[[0, 4 + c, a]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
            let Some(label) = Label::from_index(class_idx) else {
                continue;
            };
            let (cx, cy, w, h) = (
                view[[0, 0, a]],
                view[[0, 1, a]],
                view[[0, 2, a]],
                view[[0, 3, a]],
            );
            let obj = DetectedObject::new(
                label,
                [
                    (cx - w / 2.0) * sx,
                    (cy - h / 2.0) * sy,
                    (cx + w / 2.0) * sx,
                    (cy + h / 2.0) * sy,
                ],
                score,
            );
            if params.accepts(&obj) {
                objects.push(obj);
            }
        }
        non_max_suppression(&mut objects, params.nms_threshold);
        Ok(objects)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        image: &RgbImage,
        params: &DetectParams,
    ) -> Result<Option<Vec<DetectedObject>>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(None);
        }
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, image, params).map(Some)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.input_size, self.input_size);
        self.detect(&blank, &DetectParams::default()).map(|_| ())
    }
}
