//! Segmentation engines and the inference backends behind them
//!
//! - `u2net`: model-based primary engine over an `InferenceBackend`
//! - `fallback`: rectangle initialization shared by the fallback engines
//! - `grabcut`: OpenCV GrabCut fallback (`opencv` feature)
//! - `rect_refine`: pure-Rust fallback used when OpenCV is not compiled in
//! - `onnx` / `tract`: inference runtimes for the primary engine

pub mod fallback;
pub mod rect_refine;
pub mod u2net;

#[cfg(feature = "opencv")]
pub mod grabcut;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for engine testing
#[cfg(test)]
pub mod test_utils;

use crate::{
    error::Result,
    types::{BgrImage, EngineKind, SegmentationMask},
};

pub use self::rect_refine::RectRefineEngine;
pub use self::u2net::PrimaryEngine;

#[cfg(feature = "opencv")]
pub use self::grabcut::GrabCutEngine;

/// Fallback engine built by the default factory
#[cfg(feature = "opencv")]
pub type DefaultFallback = GrabCutEngine;

/// Fallback engine built by the default factory
#[cfg(not(feature = "opencv"))]
pub type DefaultFallback = RectRefineEngine;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

/// Capability shared by the primary and fallback engines
///
/// Engines are constructed once and shared across concurrent requests, so
/// `segment` takes `&self`. Implementations needing exclusive state guard it
/// internally.
pub trait SegmentationEngine: Send + Sync {
    /// Engine name used in metrics and metadata (e.g. "u2netp")
    fn name(&self) -> &str;

    /// Role of the engine in the orchestration
    fn kind(&self) -> EngineKind;

    /// Produce a binary mask with the image's dimensions
    ///
    /// # Errors
    /// `EngineFailure` for runtime errors or malformed outputs.
    fn segment(&self, image: &BgrImage) -> Result<SegmentationMask>;
}
