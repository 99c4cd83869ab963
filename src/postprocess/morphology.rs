//! Binary morphology on masks
//!
//! Square structuring elements (an L-infinity ball of radius `kernel / 2`)
//! over `imageproc`. Pixels outside the image do not take part in erosion or
//! dilation. The median filter pads by continuity.

use crate::types::SegmentationMask;
use image::GrayImage;
use imageproc::{distance_transform::Norm, filter::median_filter, morphology};

/// Samples above this become 255, the rest 0
pub const BINARY_THRESHOLD: u8 = 127;

/// Force every sample to 0 or 255
pub fn rebinarize(mask: &mut SegmentationMask) {
    for v in &mut mask.data {
        *v = if *v > BINARY_THRESHOLD { 255 } else { 0 };
    }
}

/// Grayscale view of a mask, zero-padded or truncated to `width * height`
pub(crate) fn to_gray(mask: &SegmentationMask) -> GrayImage {
    let (width, height) = mask.dimensions;
    let mut data = mask.data.clone();
    data.resize(mask.area(), 0);
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Structuring element radius for a kernel side
fn radius(kernel: u32) -> u8 {
    u8::try_from(kernel / 2).unwrap_or(u8::MAX)
}

fn apply(
    mask: &SegmentationMask,
    kernel: u32,
    op: fn(&GrayImage, Norm, u8) -> GrayImage,
) -> SegmentationMask {
    if kernel <= 1 || mask.area() == 0 {
        return mask.clone();
    }
    SegmentationMask::from_image(&op(&to_gray(mask), Norm::LInf, radius(kernel)))
}

#[must_use]
pub fn erode(mask: &SegmentationMask, kernel: u32) -> SegmentationMask {
    apply(mask, kernel, morphology::erode)
}

#[must_use]
pub fn dilate(mask: &SegmentationMask, kernel: u32) -> SegmentationMask {
    apply(mask, kernel, morphology::dilate)
}

/// Erosion followed by dilation
#[must_use]
pub fn open(mask: &SegmentationMask, kernel: u32) -> SegmentationMask {
    apply(mask, kernel, morphology::open)
}

/// Dilation followed by erosion
#[must_use]
pub fn close(mask: &SegmentationMask, kernel: u32) -> SegmentationMask {
    apply(mask, kernel, morphology::close)
}

/// Median filter with a square window of side `window`
///
/// On {0,255} data the median is a majority vote.
#[must_use]
pub fn median_binary(mask: &SegmentationMask, window: u32) -> SegmentationMask {
    if window <= 1 || mask.area() == 0 {
        return mask.clone();
    }
    let radius = window / 2;
    SegmentationMask::from_image(&median_filter(&to_gray(mask), radius, radius))
}
