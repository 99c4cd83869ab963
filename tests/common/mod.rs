//! Shared helpers for integration tests: scripted engines and synthetic images

#![allow(dead_code)]

use garment_cutout::{
    BackendType, BgrImage, EngineFactory, EngineKind, EngineRegistry, GarmentCutoutProcessor,
    MetricsRegistry, Result, SegmentationConfig, SegmentationEngine, SegmentationError,
    SegmentationMask,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

type MaskFn = dyn Fn(u32, u32) -> Result<SegmentationMask> + Send + Sync;

/// Engine whose output is produced by a closure over the image size
pub struct ScriptedEngine {
    name: &'static str,
    kind: EngineKind,
    delay: Option<Duration>,
    script: Box<MaskFn>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn new<F>(name: &'static str, kind: EngineKind, script: F) -> Self
    where
        F: Fn(u32, u32) -> Result<SegmentationMask> + Send + Sync + 'static,
    {
        Self {
            name,
            kind,
            delay: None,
            script: Box::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Primary engine returning a centered square covering `ratio` of the image
    pub fn primary_square(ratio: f64) -> Self {
        Self::new("u2netp", EngineKind::Primary, move |w, h| {
            Ok(centered_square(w, h, ratio))
        })
    }

    /// Fallback engine returning a centered square covering `ratio` of the image
    pub fn fallback_square(ratio: f64) -> Self {
        Self::new("grabcut", EngineKind::Fallback, move |w, h| {
            Ok(centered_square(w, h, ratio))
        })
    }

    pub fn failing(name: &'static str, kind: EngineKind) -> Self {
        Self::new(name, kind, |_, _| {
            Err(SegmentationError::engine_failure("scripted failure"))
        })
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl SegmentationEngine for ScriptedEngine {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn segment(&self, image: &BgrImage) -> Result<SegmentationMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        (self.script)(image.width(), image.height())
    }
}

/// Factory whose primary engine can never be built
pub struct NoModelFactory {
    pub primary_builds: Arc<AtomicUsize>,
    pub fallback_ratio: f64,
}

impl NoModelFactory {
    pub fn new(fallback_ratio: f64) -> Self {
        Self {
            primary_builds: Arc::new(AtomicUsize::new(0)),
            fallback_ratio,
        }
    }
}

impl EngineFactory for NoModelFactory {
    fn create_primary(&self, _config: &SegmentationConfig) -> Result<Arc<dyn SegmentationEngine>> {
        self.primary_builds.fetch_add(1, Ordering::SeqCst);
        Err(SegmentationError::engine_unavailable("u2netp weights not found"))
    }

    fn create_fallback(&self, _config: &SegmentationConfig) -> Result<Arc<dyn SegmentationEngine>> {
        Ok(Arc::new(ScriptedEngine::fallback_square(self.fallback_ratio)))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        Vec::new()
    }
}

/// Centered filled square whose area is roughly `ratio` of the image
pub fn centered_square(width: u32, height: u32, ratio: f64) -> SegmentationMask {
    let mut mask = SegmentationMask::zeros(width, height);
    let side = ((f64::from(width) * f64::from(height) * ratio).sqrt().round() as u32)
        .min(width)
        .min(height);
    mask.fill_rect((width - side) / 2, (height - side) / 2, side, side, 255);
    mask
}

/// Mask with exactly `count` foreground pixels in the first row(s)
pub fn leading_pixels(width: u32, height: u32, count: usize) -> SegmentationMask {
    let mut data = vec![0u8; (width * height) as usize];
    for value in data.iter_mut().take(count) {
        *value = 255;
    }
    SegmentationMask::new(data, (width, height))
}

/// Uniform gray BGR image
pub fn gray_image(width: u32, height: u32) -> BgrImage {
    BgrImage::from_raw(width, height, vec![128; (width * height * 3) as usize])
        .expect("buffer length matches dimensions")
}

/// Default configuration without gamma so colors pass through unchanged
pub fn test_config() -> SegmentationConfig {
    SegmentationConfig::builder()
        .gamma(1.0)
        .build()
        .expect("valid test configuration")
}

/// Processor over two scripted engines plus its metrics registry
pub fn processor_with(
    config: SegmentationConfig,
    primary: Arc<dyn SegmentationEngine>,
    fallback: Arc<dyn SegmentationEngine>,
) -> (GarmentCutoutProcessor, Arc<MetricsRegistry>) {
    let metrics = Arc::new(MetricsRegistry::new());
    let engines = Arc::new(EngineRegistry::from_engines(primary, fallback));
    let processor = GarmentCutoutProcessor::with_parts(config, engines, Arc::clone(&metrics))
        .expect("valid processor parts");
    (processor, metrics)
}
