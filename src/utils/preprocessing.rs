//! Shared image preprocessing utilities
//!
//! Downscaling and gamma correction applied before segmentation, and the
//! tensor preparation used by the primary engine.

use crate::{
    error::{Result, SegmentationError},
    types::BgrImage,
};
use image::{imageops::FilterType, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;

/// Tensor normalization for the primary segmentation model
#[derive(Debug, Clone, PartialEq)]
pub struct TensorPreprocessing {
    /// Square model input side
    pub input_size: u32,
    /// Per-channel mean (RGB)
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation (RGB)
    pub normalization_std: [f32; 3],
}

impl Default for TensorPreprocessing {
    fn default() -> Self {
        Self {
            input_size: 320,
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Downscale so the longer edge is at most `max_edge`
    ///
    /// Resamples with `FilterType::Triangle`, whose support widens with the
    /// reduction factor so every source pixel contributes to the output.
    /// Never upscales. Target dimensions are truncated to integers and
    /// clamped to at least one pixel.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn resize_long_edge(image: &BgrImage, max_edge: u32) -> Result<BgrImage> {
        let (width, height) = image.dimensions();
        let long_edge = width.max(height);
        if long_edge <= max_edge || long_edge == 0 {
            return Ok(image.clone());
        }

        let scale = f64::from(max_edge) / f64::from(long_edge);
        let new_width = ((f64::from(width) * scale) as u32).max(1);
        let new_height = ((f64::from(height) * scale) as u32).max(1);

        // Channel order is irrelevant for resampling, so the BGR bytes are
        // reinterpreted without swapping.
        let buffer: RgbImage = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(
            width,
            height,
            image.as_raw().to_vec(),
        )
        .ok_or_else(|| SegmentationError::internal("Image buffer length mismatch"))?;

        let resized = image::imageops::resize(&buffer, new_width, new_height, FilterType::Triangle);

        BgrImage::from_raw(new_width, new_height, resized.into_raw())
            .ok_or_else(|| SegmentationError::internal("Resized buffer length mismatch"))
    }

    /// Build the 256-entry gamma lookup table
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn gamma_lut(gamma: f32) -> [u8; 256] {
        let inv_gamma = 1.0 / f64::from(gamma);
        let mut lut = [0u8; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let value = (i as f64 / 255.0).powf(inv_gamma) * 255.0;
            *entry = value.clamp(0.0, 255.0) as u8;
        }
        lut
    }

    /// Apply gamma correction through a lookup table. Identity when `gamma == 1`.
    #[must_use]
    pub fn gamma_correct(image: &BgrImage, gamma: f32) -> BgrImage {
        if (gamma - 1.0).abs() < f32::EPSILON {
            return image.clone();
        }

        let lut = Self::gamma_lut(gamma);
        let data = image.as_raw().iter().map(|&v| lut[v as usize]).collect();
        BgrImage::from_raw(image.width(), image.height(), data).unwrap_or_else(|| image.clone())
    }

    /// Prepare the primary model input tensor (NCHW, RGB order)
    ///
    /// The image is resized to the square model input, scaled by its maximum
    /// sample value and normalized with the configured mean and std.
    pub fn prepare_tensor(image: &BgrImage, config: &TensorPreprocessing) -> Result<Array4<f32>> {
        let size = config.input_size;
        if size == 0 {
            return Err(SegmentationError::invalid_config(
                "Model input size must be positive",
            ));
        }

        let rgb = image.to_rgb();
        let resized = if rgb.dimensions() == (size, size) {
            rgb
        } else {
            image::imageops::resize(&rgb, size, size, FilterType::Lanczos3)
        };

        let max_value = resized
            .as_raw()
            .iter()
            .copied()
            .max()
            .map_or(0.0, f32::from)
            .max(1e-6);

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match the resized image
        for (y, row) in resized.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for c in 0..3 {
                    let scaled = f32::from(pixel[c]) / max_value;
                    tensor[[0, c, y, x]] =
                        (scaled - config.normalization_mean[c]) / config.normalization_std[c];
                }
            }
        }

        Ok(tensor)
    }
}
