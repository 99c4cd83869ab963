//! RGBA cutout assembly

use crate::{
    error::{Result, SegmentationError},
    types::{BgrImage, SegmentationMask},
};
use image::RgbaImage;

/// Combine a BGR image and a binary mask into an RGBA cutout
///
/// Color channels are reordered to RGB and the alpha channel is a byte copy
/// of `mask`.
///
/// # Errors
/// `SegmentationError::DimensionMismatch` when the sizes differ or the mask
/// buffer does not match its stated size.
pub fn cutout_rgba(image: &BgrImage, mask: &SegmentationMask) -> Result<RgbaImage> {
    if image.dimensions() != mask.dimensions || !mask.is_well_formed() {
        return Err(SegmentationError::DimensionMismatch {
            image: image.dimensions(),
            mask: mask.dimensions,
        });
    }

    let mut data = Vec::with_capacity(mask.data.len() * 4);
    for (bgr, &alpha) in image.as_raw().chunks_exact(3).zip(&mask.data) {
        data.extend_from_slice(&[bgr[2], bgr[1], bgr[0], alpha]);
    }

    let (width, height) = image.dimensions();
    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| SegmentationError::internal("Cutout buffer length mismatch"))
}
