//! Image I/O operations service
//!
//! Decoding of untrusted input bytes with size, signature and dimension
//! checks, file loading, and PNG encoding of masks and cutouts.

use crate::{
    config::SegmentationConfig,
    error::{Result, SegmentationError},
    types::{BgrImage, SegmentationMask},
};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::{io::Cursor, path::Path};
use tracing::debug;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Limits applied to encoded input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    /// Largest accepted encoded size
    pub max_file_bytes: usize,
    /// Smallest accepted width and height
    pub min_edge: u32,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self::from_config(&SegmentationConfig::default())
    }
}

impl InputLimits {
    #[must_use]
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_bytes,
            min_edge: config.min_edge,
        }
    }
}

/// Service for handling image input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Identify JPEG or PNG content by its leading bytes
    #[must_use]
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        if bytes.starts_with(JPEG_MAGIC) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(PNG_MAGIC) {
            Some(ImageFormat::Png)
        } else {
            None
        }
    }

    /// Decode untrusted bytes into a BGR image
    ///
    /// # Errors
    /// `InvalidInput` when the input is too large, is not JPEG or PNG, cannot
    /// be decoded, or has a side shorter than `limits.min_edge`.
    pub fn decode_bytes(bytes: &[u8], limits: &InputLimits) -> Result<BgrImage> {
        if bytes.len() > limits.max_file_bytes {
            return Err(SegmentationError::invalid_input(format!(
                "File too large: {} bytes (maximum {} bytes)",
                bytes.len(),
                limits.max_file_bytes
            )));
        }

        let format = Self::detect_format(bytes).ok_or_else(|| {
            SegmentationError::invalid_input("Unsupported file type. Only JPEG and PNG are accepted")
        })?;

        let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            SegmentationError::invalid_input(format!("Failed to decode image: {e}"))
        })?;

        let (width, height) = (decoded.width(), decoded.height());
        if width < limits.min_edge || height < limits.min_edge {
            return Err(SegmentationError::invalid_input(format!(
                "Image too small: {}x{} (minimum edge {}px)",
                width, height, limits.min_edge
            )));
        }

        debug!(?format, width, height, bytes = bytes.len(), "Decoded input image");
        Ok(BgrImage::from_dynamic(&decoded))
    }

    /// Load an image from a file path
    ///
    /// # Errors
    /// I/O errors reading the file and decoding errors.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)?;
        image::load_from_memory(&data).map_err(|e| {
            SegmentationError::invalid_input(format!(
                "Failed to decode {}: {}",
                path_ref.display(),
                e
            ))
        })
    }

    /// Encode an RGBA cutout as PNG
    ///
    /// # Errors
    /// Encoder failures.
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Encode a mask as a grayscale PNG
    ///
    /// # Errors
    /// Encoder failures.
    pub fn encode_mask_png(mask: &SegmentationMask) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        mask.to_image()?.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}
