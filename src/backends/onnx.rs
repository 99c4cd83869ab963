//! ONNX Runtime backend for the primary segmentation model

use crate::error::{Result, SegmentationError};
use crate::inference::{read_model_bytes, to_array4, BackendConfig, InferenceBackend};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};
use tracing::{debug, info};

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// ONNX Runtime backend
#[derive(Debug, Default)]
pub struct OnnxBackend {
    session: Option<Session>,
    initialized: bool,
}

impl OnnxBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn load_model(&mut self, config: &BackendConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = read_model_bytes(config)?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        };

        let session = Session::builder()
            .map_err(|e| {
                SegmentationError::engine_unavailable(format!(
                    "Failed to create session builder: {e}"
                ))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                SegmentationError::engine_unavailable(format!(
                    "Failed to set optimization level: {e}"
                ))
            })?
            .with_intra_threads(intra_threads)
            .map_err(|e| {
                SegmentationError::engine_unavailable(format!("Failed to set intra threads: {e}"))
            })?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                SegmentationError::engine_unavailable(format!(
                    "Failed to create session from model data: {e}"
                ))
            })?;

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        info!(
            model = %config.model_path.display(),
            intra_threads,
            load_ms = model_load_time.as_millis() as u64,
            "ONNX Runtime session created"
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &BackendConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SegmentationError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        debug!(input_shape = ?input.dim(), "Starting ONNX inference");

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            SegmentationError::engine_failure(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs and outputs avoid tensor name dependencies
        let outputs = session.run(ort::inputs![input_value]).map_err(|e| {
            SegmentationError::engine_failure(format!("ONNX inference failed: {e}"))
        })?;

        let (shape, values) = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| SegmentationError::engine_failure("No output tensors found"))?;
            let output_tensor = outputs
                .get(first_key)
                .ok_or_else(|| SegmentationError::engine_failure("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    SegmentationError::engine_failure(format!(
                        "Failed to extract output tensor: {e}"
                    ))
                })?;
            (
                output_tensor.shape().to_vec(),
                output_tensor.iter().copied().collect::<Vec<f32>>(),
            )
        };

        let output = to_array4(&shape, values)?;
        debug!(
            output_shape = ?output.dim(),
            inference_ms = inference_start.elapsed().as_millis() as u64,
            "ONNX inference complete"
        );
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(all(test, feature = "onnx"))]
mod tests {
    use super::*;

    #[test]
    fn test_onnx_backend_creation() {
        let backend = OnnxBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(backend.name(), "onnx");
    }

    #[test]
    fn test_onnx_backend_missing_model() {
        let mut backend = OnnxBackend::new();
        let config = BackendConfig::new("/nonexistent/u2netp.onnx");
        let err = backend.initialize(&config).unwrap_err();
        assert!(matches!(err, SegmentationError::EngineUnavailable(_)));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_onnx_backend_infer_before_init() {
        let mut backend = OnnxBackend::new();
        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        assert!(backend.infer(&input).is_err());
    }

    #[test]
    fn test_onnx_backend_rejects_garbage_model() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not an onnx model").unwrap();
        let mut backend = OnnxBackend::new();
        let err = backend
            .initialize(&BackendConfig::new(file.path()))
            .unwrap_err();
        assert!(matches!(err, SegmentationError::EngineUnavailable(_)));
    }
}
