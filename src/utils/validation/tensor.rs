//! Tensor validation utilities
//!
//! Shape checks for model input and output tensors.

use crate::error::{Result, SegmentationError};
use ndarray::Array4;

/// Validator for tensor shapes
pub struct TensorValidator;

impl TensorValidator {
    /// Validate tensor shape matches expected dimensions
    pub fn validate_tensor_shape(
        tensor: &Array4<f32>,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.dim();
        if actual != expected_shape {
            let (batch, channels, height, width) = expected_shape;
            return Err(SegmentationError::engine_failure(format!(
                "Tensor shape mismatch. Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                batch, channels, height, width, actual.0, actual.1, actual.2, actual.3
            )));
        }

        Ok(())
    }

    /// A mask output must carry exactly one alpha-like channel for one image
    pub fn validate_single_batch_single_channel(tensor: &Array4<f32>) -> Result<()> {
        let (batch, channels, height, width) = tensor.dim();
        if batch != 1 || channels != 1 {
            return Err(SegmentationError::engine_failure(format!(
                "Unexpected model output shape [{}, {}, {}, {}]: expected batch size 1 and a single alpha channel",
                batch, channels, height, width
            )));
        }
        if height == 0 || width == 0 {
            return Err(SegmentationError::engine_failure(
                "Model output has an empty spatial extent",
            ));
        }
        Ok(())
    }
}
