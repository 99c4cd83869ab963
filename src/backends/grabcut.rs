//! OpenCV GrabCut fallback engine
//!
//! Runs `cv::grabCut` initialized from the shared `InitRect` and keeps both
//! definite and probable foreground labels.

use crate::{
    backends::{
        fallback::{InitRect, ITERATIONS},
        SegmentationEngine,
    },
    error::{Result, SegmentationError},
    types::{BgrImage, EngineKind, SegmentationMask},
};
use opencv::{
    core::{self, Mat, Rect, Scalar},
    imgproc,
    prelude::*,
};
use tracing::debug;

fn cv_error(e: opencv::Error) -> SegmentationError {
    SegmentationError::engine_failure(format!("OpenCV GrabCut failed: {e}"))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| SegmentationError::engine_failure(format!("{value} exceeds OpenCV limits")))
}

/// GrabCut engine over the `opencv` bindings
#[derive(Debug, Clone, Copy, Default)]
pub struct GrabCutEngine;

impl GrabCutEngine {
    pub const NAME: &'static str = "grabcut";

    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn run(image: &BgrImage) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();
        let rect = InitRect::for_image(width, height)?;

        let mut src = Mat::new_rows_cols_with_default(
            to_i32(height)?,
            to_i32(width)?,
            core::CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(cv_error)?;
        let pixels = src.data_bytes_mut().map_err(cv_error)?;
        if pixels.len() != image.as_raw().len() {
            return Err(SegmentationError::internal("OpenCV image buffer length mismatch"));
        }
        pixels.copy_from_slice(image.as_raw());

        let mut labels = Mat::default();
        let mut bgd_model = Mat::default();
        let mut fgd_model = Mat::default();
        let cv_rect = Rect::new(
            to_i32(rect.x)?,
            to_i32(rect.y)?,
            to_i32(rect.width)?,
            to_i32(rect.height)?,
        );
        let iterations = i32::try_from(ITERATIONS).unwrap_or(i32::MAX);
        imgproc::grab_cut(
            &src,
            &mut labels,
            cv_rect,
            &mut bgd_model,
            &mut fgd_model,
            iterations,
            imgproc::GC_INIT_WITH_RECT,
        )
        .map_err(cv_error)?;

        let data: Vec<u8> = labels
            .data_bytes()
            .map_err(cv_error)?
            .iter()
            .map(|&label| {
                let label = i32::from(label);
                if label == imgproc::GC_FGD || label == imgproc::GC_PR_FGD {
                    255
                } else {
                    0
                }
            })
            .collect();
        debug!(
            foreground = data.iter().filter(|&&v| v != 0).count(),
            "GrabCut finished"
        );

        SegmentationMask::from_raw(width, height, data).ok_or_else(|| {
            SegmentationError::engine_failure("GrabCut returned a label map of unexpected size")
        })
    }
}

impl SegmentationEngine for GrabCutEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Fallback
    }

    fn segment(&self, image: &BgrImage) -> Result<SegmentationMask> {
        Self::run(image)
    }
}
