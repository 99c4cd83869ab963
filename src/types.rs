//! Core types for garment segmentation operations

use crate::error::{Result, SegmentationError};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Three-channel 8-bit color image stored in the engines' native BGR order
///
/// Immutable input to the pipeline. Use [`BgrImage::from_dynamic`] or
/// [`BgrImage::from_rgb`] to build one from decoded image data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrImage {
    data: Vec<u8>,
    dimensions: (u32, u32),
}

impl BgrImage {
    /// Wrap raw interleaved BGR bytes. Returns `None` when the buffer length
    /// does not equal `width * height * 3`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(3)?;
        (data.len() == expected).then_some(Self {
            data,
            dimensions: (width, height),
        })
    }

    /// Build from an RGB image, swapping the first and third channels
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.as_raw().clone();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Self {
            data,
            dimensions: (width, height),
        }
    }

    /// Build from any decoded image (alpha is discarded)
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::from_rgb(&image.to_rgb8())
    }

    /// Convert back to an RGB image
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        let mut data = self.data.clone();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        // Length invariant is upheld by every constructor
        ImageBuffer::from_raw(self.dimensions.0, self.dimensions.1, data)
            .unwrap_or_else(|| RgbImage::new(self.dimensions.0, self.dimensions.1))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// Raw interleaved BGR bytes
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// BGR triple at (x, y)
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.dimensions.0 as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }
}

/// Single-channel binary mask, each sample 0 or 255
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// Mask data in row-major order
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    ///
    /// The buffer length is not checked; see [`Self::from_raw`] and
    /// [`Self::is_well_formed`].
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Create a mask, returning `None` unless `data` holds exactly
    /// `width * height` samples
    #[must_use]
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then(|| Self::new(data, (width, height)))
    }

    /// True if the buffer length matches the stated dimensions
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.area()
    }

    /// All-background mask
    #[must_use]
    pub fn zeros(width: u32, height: u32) -> Self {
        Self::new(vec![0; width as usize * height as usize], (width, height))
    }

    /// Create mask from a grayscale image
    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.as_raw().clone(), (width, height))
    }

    /// Convert mask to a grayscale image
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(width, height, self.data.clone()).ok_or_else(
            || SegmentationError::internal("Failed to create image from mask data"),
        )
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Total pixel count
    #[must_use]
    pub fn area(&self) -> usize {
        self.dimensions.0 as usize * self.dimensions.1 as usize
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.dimensions.0 as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let idx = y as usize * self.dimensions.0 as usize + x as usize;
        self.data[idx] = value;
    }

    /// Fill an axis-aligned rectangle with `value` (clipped to the mask)
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, value: u8) {
        let x_end = x.saturating_add(width).min(self.dimensions.0);
        let y_end = y.saturating_add(height).min(self.dimensions.1);
        for yy in y..y_end {
            for xx in x..x_end {
                self.set(xx, yy, value);
            }
        }
    }

    /// Number of foreground (nonzero) samples within `area()`
    #[must_use]
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().take(self.area()).filter(|&&v| v != 0).count()
    }

    /// True if every sample is exactly 0 or 255
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.data.iter().all(|&v| v == 0 || v == 255)
    }

    /// Save the mask as a grayscale PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Integer axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `[x, y, width, height]`
    #[must_use]
    pub fn to_xywh(&self) -> [u32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    /// True if the box lies within an image of the given size
    #[must_use]
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x.saturating_add(self.width) <= width && self.y.saturating_add(self.height) <= height
    }
}

/// Which engine produced an accepted mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Model-based segmenter
    Primary,
    /// Classical rectangle-initialized segmenter
    Fallback,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Outcome of the engine orchestration for one request
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    /// Accepted engine mask (before post-processing)
    pub mask: SegmentationMask,

    /// Engine that produced the accepted mask
    pub engine_used: EngineKind,

    /// Engine name as reported by the engine (e.g. "u2netp", "grabcut")
    pub engine_name: String,

    /// Whether a primary-stage anomaly triggered the fallback
    pub fallback_triggered: bool,

    /// Area ratio of the accepted mask
    pub area_ratio: f64,

    /// Wall-clock orchestration time
    pub duration_ms: u64,
}

/// Wall-clock time spent in each pipeline stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    /// Resize and gamma correction
    pub preprocess_ms: u64,
    /// Engine orchestration (primary, validation, fallback)
    pub segment_ms: u64,
    /// Cleanup, hole filling, bounding box and compositing
    pub postprocess_ms: u64,
    /// End-to-end
    pub total_ms: u64,
}

/// Metadata returned alongside a cutout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoutMetadata {
    pub request_id: String,
    pub engine_used: EngineKind,
    pub engine_name: String,
    pub fallback_triggered: bool,
    /// Area ratio of the final post-processed mask
    pub mask_area_ratio: f64,
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub bbox_xywh: [u32; 4],
    pub morph_kernel: u32,
    pub median_blur: u32,
    pub gamma: f32,
    pub timings: StageTimings,
}

/// Result of the full cutout pipeline
#[derive(Debug, Clone)]
pub struct CutoutResult {
    /// RGBA cutout, alpha byte-identical to `mask`
    pub cutout: RgbaImage,

    /// Final post-processed mask
    pub mask: SegmentationMask,

    /// Mask intended for color sampling (eroded when configured)
    pub color_mask: SegmentationMask,

    /// Tight bounding box of `mask`
    pub bbox: BoundingBox,

    pub metadata: CutoutMetadata,
}

impl CutoutResult {
    /// Save the cutout as PNG with alpha channel
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.cutout
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Save the final mask as a grayscale PNG
    pub fn save_mask_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.mask.save_png(path)
    }

    /// Get the cutout as raw RGBA bytes
    #[must_use]
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.cutout.as_raw().clone()
    }

    /// Cutout dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.cutout.dimensions()
    }
}
