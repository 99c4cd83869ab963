//! Rectangle initialization shared by the fallback engines
//!
//! Pixels outside a centered rectangle are fixed background; pixels inside
//! start as probable foreground.

use crate::error::{Result, SegmentationError};

/// Fraction of each dimension left as a margin on either side
pub const RECT_MARGIN: f64 = 0.15;

/// Refinement iterations
pub const ITERATIONS: usize = 5;

/// Centered initialization rectangle `(x, y, width, height)` with per-axis
/// integer-truncated margins
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn init_rect(width: u32, height: u32) -> (u32, u32, i64, i64) {
    let margin_w = (RECT_MARGIN * f64::from(width)) as u32;
    let margin_h = (RECT_MARGIN * f64::from(height)) as u32;
    (
        margin_w,
        margin_h,
        i64::from(width) - 2 * i64::from(margin_w),
        i64::from(height) - 2 * i64::from(margin_h),
    )
}

/// Initialization rectangle that leaves background samples on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl InitRect {
    /// # Errors
    /// `EngineFailure` when the rectangle is empty or covers the whole image.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_image(width: u32, height: u32) -> Result<Self> {
        let (x, y, rect_w, rect_h) = init_rect(width, height);
        if rect_w <= 0 || rect_h <= 0 {
            return Err(SegmentationError::engine_failure(format!(
                "Image too small for rectangle initialization ({}x{})",
                width, height
            )));
        }
        if x == 0 && y == 0 {
            return Err(SegmentationError::engine_failure(format!(
                "Initialization rectangle covers the whole {}x{} image, no background samples",
                width, height
            )));
        }
        Ok(Self {
            x,
            y,
            width: rect_w as u32,
            height: rect_h as u32,
        })
    }

    /// Exclusive end column
    #[must_use]
    pub fn x_end(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive end row
    #[must_use]
    pub fn y_end(&self) -> u32 {
        self.y + self.height
    }
}
