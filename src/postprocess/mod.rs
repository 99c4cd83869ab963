//! Mask post-processing: morphological cleanup, hole filling and tight
//! bounding-box extraction.
//!
//! Kernel and blur sizes are assumed to be validated by the configuration
//! layer (`NumericValidator`). Every public operation returns a mask whose
//! samples are exactly 0 or 255.

pub mod morphology;

use crate::{
    error::{Result, SegmentationError},
    quality,
    types::{BoundingBox, SegmentationMask},
};
use image::Luma;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashSet;
use tracing::debug;

pub use morphology::{close, dilate, erode, median_binary, open, rebinarize};

/// Opening, closing and an optional median filter, re-binarizing after each step
#[must_use]
pub fn clean_mask(mask: &SegmentationMask, kernel: u32, blur: u32) -> SegmentationMask {
    let mut current = mask.clone();
    rebinarize(&mut current);

    current = open(&current, kernel);
    rebinarize(&mut current);

    current = close(&current, kernel);
    rebinarize(&mut current);

    if blur > 0 {
        current = median_binary(&current, blur);
        rebinarize(&mut current);
    }

    debug!(
        kernel,
        blur,
        before = mask.count_nonzero(),
        after = current.count_nonzero(),
        "Mask cleaned"
    );
    current
}

/// Set every zero region not 4-connected to the border to 255
///
/// Any nonzero input sample counts as foreground and comes out as 255.
#[must_use]
pub fn fill_holes(mask: &SegmentationMask) -> SegmentationMask {
    let (width, height) = mask.dimensions;
    let mut background = morphology::to_gray(mask);
    for value in background.iter_mut() {
        *value = if *value == 0 { 255 } else { 0 };
    }
    let labels = connected_components(&background, Connectivity::Four, Luma([0u8]));

    let mut exterior = HashSet::new();
    if width > 0 && height > 0 {
        for x in 0..width {
            exterior.insert(labels.get_pixel(x, 0)[0]);
            exterior.insert(labels.get_pixel(x, height - 1)[0]);
        }
        for y in 0..height {
            exterior.insert(labels.get_pixel(0, y)[0]);
            exterior.insert(labels.get_pixel(width - 1, y)[0]);
        }
    }

    let mut filled = 0usize;
    let data: Vec<u8> = labels
        .iter()
        .map(|&label| {
            if label == 0 {
                255
            } else if exterior.contains(&label) {
                0
            } else {
                filled += 1;
                255
            }
        })
        .collect();
    if filled > 0 {
        debug!(filled, "Interior holes filled");
    }
    SegmentationMask::new(data, (width, height))
}

/// Minimal axis-aligned box enclosing every nonzero sample
///
/// # Errors
/// `SegmentationError::EmptyMask` when the mask has no nonzero samples.
pub fn tight_bbox(mask: &SegmentationMask) -> Result<BoundingBox> {
    let width = mask.width() as usize;
    let mut bounds: Option<(usize, usize, usize, usize)> = None;

    let samples = mask.data.get(..mask.area()).unwrap_or(&mask.data);
    for (y, row) in samples.chunks_exact(width.max(1)).enumerate() {
        let Some(first) = row.iter().position(|&v| v != 0) else {
            continue;
        };
        let last = row.iter().rposition(|&v| v != 0).unwrap_or(first);
        bounds = Some(match bounds {
            None => (first, y, last, y),
            Some((x0, y0, x1, _)) => (x0.min(first), y0, x1.max(last), y),
        });
    }

    let (x0, y0, x1, y1) = bounds.ok_or(SegmentationError::EmptyMask)?;
    #[allow(clippy::cast_possible_truncation)]
    Ok(BoundingBox::new(
        x0 as u32,
        y0 as u32,
        (x1 - x0 + 1) as u32,
        (y1 - y0 + 1) as u32,
    ))
}

/// Foreground fraction of a mask
#[must_use]
pub fn calculate_mask_area_ratio(mask: &SegmentationMask) -> f64 {
    quality::area_ratio(mask)
}

/// Area-ratio check with the default bounds
#[must_use]
pub fn validate_mask_quality(mask: &SegmentationMask) -> bool {
    quality::is_valid(mask)
}

/// Mask used for color sampling: eroded by `kernel` when requested
#[must_use]
pub fn color_sampling_mask(mask: &SegmentationMask, kernel: u32, erode_first: bool) -> SegmentationMask {
    if erode_first {
        let mut eroded = erode(mask, kernel);
        rebinarize(&mut eroded);
        eroded
    } else {
        mask.clone()
    }
}
