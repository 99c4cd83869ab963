//! Inference backend abstraction for the primary engine

use crate::error::Result;
use ndarray::Array4;
use std::path::PathBuf;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Settings a backend needs to load the primary model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// ONNX model file
    pub model_path: PathBuf,
    /// Intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Square model input side
    pub input_size: u32,
}

impl BackendConfig {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: model_path.into(),
            intra_threads: 0,
            input_size: 320,
        }
    }

    /// Expected NCHW input shape
    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        let side = self.input_size as usize;
        (1, 3, side, side)
    }
}

/// Trait for inference backends
///
/// Backends hold runtime sessions that need exclusive access during a run,
/// so callers share them behind a lock.
pub trait InferenceBackend: Send {
    /// Load the model. Calling it again on an initialized backend is a no-op
    /// returning `None`.
    ///
    /// # Errors
    /// - Model file missing or unreadable (`EngineUnavailable`)
    /// - Runtime session construction failures (`EngineUnavailable`)
    fn initialize(&mut self, config: &BackendConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Runtime failures or non-4D outputs (`EngineFailure`)
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Short runtime name for logs
    fn name(&self) -> &'static str;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

/// Read model bytes, mapping a missing or unreadable file to `EngineUnavailable`
pub(crate) fn read_model_bytes(config: &BackendConfig) -> Result<Vec<u8>> {
    std::fs::read(&config.model_path).map_err(|e| {
        crate::error::SegmentationError::engine_unavailable(format!(
            "Cannot read model weights at {}: {}",
            config.model_path.display(),
            e
        ))
    })
}

/// Build a row-major `Array4` from a dynamic shape and its values
pub(crate) fn to_array4(shape: &[usize], values: Vec<f32>) -> Result<Array4<f32>> {
    if shape.len() != 4 {
        return Err(crate::error::SegmentationError::engine_failure(format!(
            "Expected 4D output tensor, got {}D",
            shape.len()
        )));
    }
    Array4::from_shape_vec((shape[0], shape[1], shape[2], shape[3]), values).map_err(|e| {
        crate::error::SegmentationError::engine_failure(format!(
            "Failed to reshape output tensor: {e}"
        ))
    })
}
