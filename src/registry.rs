//! Engine construction and process-wide engine handles
//!
//! Engines are built at most once through an injected `EngineFactory`. A
//! failed construction is remembered and reported as `EngineUnavailable` on
//! every later request instead of being retried.

use crate::{
    backends::{DefaultFallback, PrimaryEngine, SegmentationEngine},
    config::{BackendType, SegmentationConfig},
    error::{Result, SegmentationError},
    inference::{BackendConfig, InferenceBackend},
    types::EngineKind,
};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Factory trait for creating segmentation engines
pub trait EngineFactory: Send + Sync {
    /// Build the primary engine
    ///
    /// # Errors
    /// `EngineUnavailable` when the model or runtime cannot be loaded.
    fn create_primary(&self, config: &SegmentationConfig) -> Result<Arc<dyn SegmentationEngine>>;

    /// Build the fallback engine
    ///
    /// # Errors
    /// `EngineUnavailable` when the engine cannot be constructed.
    fn create_fallback(&self, config: &SegmentationConfig) -> Result<Arc<dyn SegmentationEngine>>;

    /// Inference runtimes compiled into this build
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory backed by the compiled-in inference runtimes
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEngineFactory;

impl DefaultEngineFactory {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn create_backend(backend_type: BackendType) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new())),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new())),
            #[allow(unreachable_patterns)]
            other => Err(SegmentationError::engine_unavailable(format!(
                "Backend '{}' is not compiled into this build",
                other
            ))),
        }
    }
}

impl EngineFactory for DefaultEngineFactory {
    fn create_primary(&self, config: &SegmentationConfig) -> Result<Arc<dyn SegmentationEngine>> {
        let model_path = config.resolved_model_path().ok_or_else(|| {
            SegmentationError::engine_unavailable("No model path configured and no home directory")
        })?;
        let backend = Self::create_backend(config.backend_type)?;
        let backend_config = BackendConfig {
            model_path,
            intra_threads: config.intra_threads,
            ..BackendConfig::new("")
        };
        Ok(Arc::new(PrimaryEngine::new(backend, &backend_config)?))
    }

    fn create_fallback(&self, _config: &SegmentationConfig) -> Result<Arc<dyn SegmentationEngine>> {
        Ok(Arc::new(DefaultFallback::new()))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

type EngineInit = Box<dyn Fn() -> Result<Arc<dyn SegmentationEngine>> + Send + Sync>;

/// Engine constructed on first use, exactly once
pub struct LazyEngine {
    kind: EngineKind,
    cell: OnceLock<std::result::Result<Arc<dyn SegmentationEngine>, String>>,
    init: Option<EngineInit>,
}

impl std::fmt::Debug for LazyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEngine")
            .field("kind", &self.kind)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl LazyEngine {
    /// Defer construction to the first `get`
    pub fn new<F>(kind: EngineKind, init: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SegmentationEngine>> + Send + Sync + 'static,
    {
        Self {
            kind,
            cell: OnceLock::new(),
            init: Some(Box::new(init)),
        }
    }

    /// Wrap an already constructed engine
    #[must_use]
    pub fn ready(engine: Arc<dyn SegmentationEngine>) -> Self {
        Self {
            kind: engine.kind(),
            cell: OnceLock::from(Ok(engine)),
            init: None,
        }
    }

    /// Permanently unavailable engine
    pub fn unavailable<S: Into<String>>(kind: EngineKind, reason: S) -> Self {
        Self {
            kind,
            cell: OnceLock::from(Err(reason.into())),
            init: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// True once construction has been attempted
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Shared engine handle, constructing it on the first call
    ///
    /// # Errors
    /// `EngineUnavailable` when construction failed now or earlier.
    pub fn get(&self) -> Result<Arc<dyn SegmentationEngine>> {
        let kind = self.kind;
        let slot = self.cell.get_or_init(|| {
            let built = match &self.init {
                Some(init) => init(),
                None => Err(SegmentationError::internal("Engine has no initializer")),
            };
            match built {
                Ok(engine) => {
                    info!(engine = engine.name(), kind = %kind, "Engine constructed");
                    Ok(engine)
                },
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Engine construction failed, marking unavailable");
                    Err(e.to_string())
                },
            }
        });
        slot.clone()
            .map_err(|reason| SegmentationError::engine_unavailable(format!("{kind} engine: {reason}")))
    }
}

/// The two engines an orchestrator works with
#[derive(Debug)]
pub struct EngineRegistry {
    primary: LazyEngine,
    fallback: LazyEngine,
}

impl EngineRegistry {
    /// Lazily build both engines through `factory`
    pub fn new(config: SegmentationConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let config = Arc::new(config);
        let primary = {
            let (config, factory) = (Arc::clone(&config), Arc::clone(&factory));
            LazyEngine::new(EngineKind::Primary, move || factory.create_primary(&config))
        };
        let fallback =
            LazyEngine::new(EngineKind::Fallback, move || factory.create_fallback(&config));
        Self { primary, fallback }
    }

    /// Registry over explicitly provided engine handles
    #[must_use]
    pub fn from_parts(primary: LazyEngine, fallback: LazyEngine) -> Self {
        Self { primary, fallback }
    }

    /// Registry over two ready engines
    #[must_use]
    pub fn from_engines(
        primary: Arc<dyn SegmentationEngine>,
        fallback: Arc<dyn SegmentationEngine>,
    ) -> Self {
        Self::from_parts(LazyEngine::ready(primary), LazyEngine::ready(fallback))
    }

    /// Primary engine handle
    ///
    /// # Errors
    /// `EngineUnavailable` when it cannot be constructed.
    pub fn primary(&self) -> Result<Arc<dyn SegmentationEngine>> {
        self.primary.get()
    }

    /// Fallback engine handle
    ///
    /// # Errors
    /// `EngineUnavailable` when it cannot be constructed.
    pub fn fallback(&self) -> Result<Arc<dyn SegmentationEngine>> {
        self.fallback.get()
    }

    fn lazy(&self, kind: EngineKind) -> &LazyEngine {
        match kind {
            EngineKind::Primary => &self.primary,
            EngineKind::Fallback => &self.fallback,
        }
    }

    /// Engine handle by role
    ///
    /// # Errors
    /// `EngineUnavailable` when it cannot be constructed.
    pub fn engine(&self, kind: EngineKind) -> Result<Arc<dyn SegmentationEngine>> {
        self.lazy(kind).get()
    }

    /// True once construction of the engine has been attempted
    #[must_use]
    pub fn is_constructed(&self, kind: EngineKind) -> bool {
        self.lazy(kind).is_initialized()
    }

    /// Construct both engines now, reporting which are usable
    pub fn warm_up(&self) -> (bool, bool) {
        (self.primary.get().is_ok(), self.fallback.get().is_ok())
    }
}
