//! Per-request image handling.
//!
//! A `Frame` lives for exactly one request/response cycle: the payload is
//! decoded, optionally shrunk so its longer side fits the detector budget, and
//! dropped once the reply is written.

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};

/// Decoded image ready for detection.
pub struct Frame {
    image: RgbImage,
    /// Factor applied to the original image (`1.0` when untouched).
    resize_ratio: f32,
}

impl Frame {
    /// Decode an encoded image payload (JPEG or PNG).
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(anyhow!("empty image payload"));
        }
        image::load_from_memory(bytes).context("decode image payload")
    }

    /// Shrink `image` proportionally when its larger side exceeds `max_wh`.
    ///
    /// Downscaling uses a triangle filter, whose support widens with the
    /// scale factor so every source pixel contributes to the result.
    pub fn prepare(image: DynamicImage, max_wh: u32) -> Self {
        let (width, height) = image.dimensions();
        let longest = width.max(height);
        if max_wh == 0 || longest <= max_wh {
            return Self {
                image: image.into_rgb8(),
                resize_ratio: 1.0,
            };
        }

        let resize_ratio = max_wh as f32 / longest as f32;
        let new_width = ((width as f32 * resize_ratio).round() as u32).max(1);
        let new_height = ((height as f32 * resize_ratio).round() as u32).max(1);
        let rgb = image.into_rgb8();
        let resized = image::imageops::resize(&rgb, new_width, new_height, FilterType::Triangle);
        log::debug!(
            "frame resized {}x{} -> {}x{} (ratio {:.4})",
            width,
            height,
            new_width,
            new_height,
            resize_ratio
        );
        Self {
            image: resized,
            resize_ratio,
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn resize_ratio(&self) -> f32 {
        self.resize_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([9, 9, 9])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn small_images_are_left_alone() -> Result<()> {
        let decoded = Frame::decode(&png_bytes(320, 200))?;
        let frame = Frame::prepare(decoded, 640);
        assert_eq!(frame.resize_ratio(), 1.0);
        assert_eq!(frame.image().dimensions(), (320, 200));
        Ok(())
    }

    #[test]
    fn large_images_are_scaled_to_fit() -> Result<()> {
        let decoded = Frame::decode(&png_bytes(1280, 720))?;
        let frame = Frame::prepare(decoded, 640);
        assert!((frame.resize_ratio() - 0.5).abs() < 1e-6);
        assert_eq!(frame.image().dimensions(), (640, 360));
        Ok(())
    }

    #[test]
    fn portrait_images_use_the_longer_side() -> Result<()> {
        let decoded = Frame::decode(&png_bytes(300, 1200))?;
        let frame = Frame::prepare(decoded, 600);
        assert_eq!(frame.image().dimensions(), (150, 600));
        Ok(())
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        assert!(Frame::decode(b"definitely not an image").is_err());
        assert!(Frame::decode(&[]).is_err());
    }
}
