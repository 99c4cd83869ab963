//! Tract backend for the primary segmentation model
//!
//! Pure Rust inference with no native runtime dependency.

use crate::error::{Result, SegmentationError};
use crate::inference::{read_model_bytes, to_array4, BackendConfig, InferenceBackend};
use ndarray::Array4;
use tract_onnx::prelude::*;
use tracing::{debug, info};

/// Type alias for the optimized runnable Tract model
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend
#[derive(Debug, Default)]
pub struct TractBackend {
    model: Option<TractModel>,
    initialized: bool,
}

impl TractBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn load_model(&mut self, config: &BackendConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = read_model_bytes(config)?;
        let (batch, channels, height, width) = config.input_shape();

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| {
                SegmentationError::engine_unavailable(format!("Failed to load ONNX model: {e}"))
            })?
            .with_input_fact(0, f32::fact([batch, channels, height, width]).into())
            .map_err(|e| {
                SegmentationError::engine_unavailable(format!("Failed to set input shape: {e}"))
            })?
            .into_optimized()
            .map_err(|e| {
                SegmentationError::engine_unavailable(format!("Failed to optimize model: {e}"))
            })?
            .into_runnable()
            .map_err(|e| {
                SegmentationError::engine_unavailable(format!(
                    "Failed to create runnable model: {e}"
                ))
            })?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        info!(
            model = %config.model_path.display(),
            load_ms = model_load_time.as_millis() as u64,
            "Tract backend initialized"
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &BackendConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| SegmentationError::internal("Tract model not initialized"))?;

        let inference_start = Instant::now();
        debug!(input_shape = ?input.shape(), "Running Tract inference");

        let input_tensor = Tensor::from(input.clone());
        let outputs = model.run(tvec![input_tensor.into()]).map_err(|e| {
            SegmentationError::engine_failure(format!("Tract inference failed: {e}"))
        })?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SegmentationError::engine_failure("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            SegmentationError::engine_failure(format!("Failed to convert output tensor: {e}"))
        })?;

        let output = to_array4(output_data.shape(), output_data.iter().copied().collect())?;
        debug!(
            output_shape = ?output.dim(),
            inference_ms = inference_start.elapsed().as_millis() as u64,
            "Tract inference complete"
        );
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "tract"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
