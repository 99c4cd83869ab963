//! Test utilities and mock implementations for engine testing
//!
//! Mock backends and engines let the orchestration and decoding logic be
//! exercised without model files or native runtimes.

use crate::{
    backends::SegmentationEngine,
    error::{Result, SegmentationError},
    inference::{BackendConfig, InferenceBackend},
    types::{BgrImage, EngineKind, SegmentationMask},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Mock inference backend returning a fixed output tensor
#[derive(Debug, Clone)]
pub struct MockInferenceBackend {
    initialized: bool,
    output: Array4<f32>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockInferenceBackend {
    #[must_use]
    pub fn with_output(output: Array4<f32>) -> Self {
        Self {
            initialized: true,
            output,
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    /// Backend whose `initialize` fails like a missing model
    #[must_use]
    pub fn failing_init() -> Self {
        let mut backend = Self::with_output(Array4::zeros((1, 1, 1, 1)));
        backend.initialized = false;
        backend.should_fail_init = true;
        backend
    }

    /// Backend whose `infer` always fails
    #[must_use]
    pub fn failing() -> Self {
        let mut backend = Self::with_output(Array4::zeros((1, 1, 1, 1)));
        backend.should_fail_inference = true;
        backend
    }
}

impl InferenceBackend for MockInferenceBackend {
    fn initialize(&mut self, _config: &BackendConfig) -> Result<Option<Duration>> {
        if self.should_fail_init {
            return Err(SegmentationError::engine_unavailable(
                "Mock backend initialization failure",
            ));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, _input: &Array4<f32>) -> Result<Array4<f32>> {
        if self.should_fail_inference {
            return Err(SegmentationError::internal("Mock inference failure"));
        }
        Ok(self.output.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Scripted behavior for `MockEngine`
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Mask covering the given area ratio
    Ratio(f64),
    /// Fail with `EngineFailure`
    Fail,
    /// Sleep before returning a mask covering the given ratio
    Slow(Duration, f64),
    /// Full-foreground mask with the image's dimensions but only half the samples
    ShortBuffer,
    /// Panic inside the worker
    Panic,
}

/// Engine that counts calls and follows a scripted behavior
#[derive(Debug, Clone)]
pub struct MockEngine {
    name: &'static str,
    kind: EngineKind,
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockEngine {
    #[must_use]
    pub fn new(name: &'static str, kind: EngineKind, behavior: MockBehavior) -> Self {
        Self {
            name,
            kind,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn primary(behavior: MockBehavior) -> Self {
        Self::new("u2netp", EngineKind::Primary, behavior)
    }

    #[must_use]
    pub fn fallback(behavior: MockBehavior) -> Self {
        Self::new("grabcut", EngineKind::Fallback, behavior)
    }

    /// Shared call counter (survives moving the engine into an `Arc`)
    #[must_use]
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

/// Mask with a top-left block of rows covering roughly `ratio` of the image
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
#[must_use]
pub fn mask_with_ratio(width: u32, height: u32, ratio: f64) -> SegmentationMask {
    let total = width as usize * height as usize;
    let on = ((total as f64) * ratio).round() as usize;
    let mut data = vec![0u8; total];
    for v in data.iter_mut().take(on.min(total)) {
        *v = 255;
    }
    SegmentationMask::new(data, (width, height))
}

impl SegmentationEngine for MockEngine {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn segment(&self, image: &BgrImage) -> Result<SegmentationMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (width, height) = image.dimensions();
        match &self.behavior {
            MockBehavior::Ratio(ratio) => Ok(mask_with_ratio(width, height, *ratio)),
            MockBehavior::Fail => Err(SegmentationError::engine_failure("Mock engine failure")),
            MockBehavior::Slow(delay, ratio) => {
                std::thread::sleep(*delay);
                Ok(mask_with_ratio(width, height, *ratio))
            },
            MockBehavior::Panic => panic!("mock engine panicked"),
            MockBehavior::ShortBuffer => {
                let samples = width as usize * height as usize / 2;
                Ok(SegmentationMask::new(vec![255; samples], (width, height)))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_with_ratio() {
        let mask = mask_with_ratio(100, 100, 0.25);
        assert_eq!(mask.count_nonzero(), 2500);
    }

    #[test]
    fn test_mock_engine_counts_calls() {
        let engine = MockEngine::primary(MockBehavior::Ratio(0.5));
        let calls = engine.calls();
        let image = BgrImage::from_raw(10, 10, vec![0; 300]).unwrap();
        engine.segment(&image).unwrap();
        engine.segment(&image).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
