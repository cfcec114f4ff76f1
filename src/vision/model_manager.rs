// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segmentation model manager
//!
//! The model is loaded once at startup and shared by every request. Loading is
//! guarded so concurrent first callers wait on a single initialization.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;

use super::anonymizer::AnonymizeError;
use super::segmentation::{ModelInfo, SegmentationModel};

/// Builds a segmentation model
///
/// `load` is blocking (file IO, ONNX session creation) and runs on the
/// blocking thread pool.
pub trait ModelLoader: Send + Sync {
    /// Load the model
    fn load(&self) -> anyhow::Result<Arc<dyn SegmentationModel>>;

    /// Human-readable description of where the model comes from
    fn source(&self) -> String;
}

/// Owns the process-wide segmentation model handle
pub struct SegmentationModelManager {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn SegmentationModel>>,
    load_count: AtomicUsize,
}

impl SegmentationModelManager {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
            load_count: AtomicUsize::new(0),
        }
    }

    /// Manager around an already-built model
    pub fn with_model(model: Arc<dyn SegmentationModel>) -> Self {
        Self {
            loader: Arc::new(PreloadedModel(model.clone())),
            model: OnceCell::new_with(Some(model)),
            load_count: AtomicUsize::new(0),
        }
    }

    /// Load the model if it is not loaded yet
    ///
    /// Calling this again after a successful load is a no-op. A failed load
    /// leaves the manager empty, so a later call retries.
    pub async fn initialize(&self) -> Result<Arc<dyn SegmentationModel>, AnonymizeError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let loader = self.loader.clone();
                let source = loader.source();
                tracing::info!("🔄 Loading segmentation model from {}", source);

                let start = Instant::now();
                let model = tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| AnonymizeError::ModelLoad(format!("Load task failed: {}", e)))?
                    .map_err(|e| {
                        tracing::error!("❌ Failed to load segmentation model: {:#}", e);
                        AnonymizeError::ModelLoad(format!("{:#}", e))
                    })?;

                self.load_count.fetch_add(1, Ordering::SeqCst);
                let info = model.info();
                tracing::info!(
                    "✅ Segmentation model {} loaded on {} in {}ms",
                    info.name,
                    info.device,
                    start.elapsed().as_millis()
                );
                Ok::<_, AnonymizeError>(model)
            })
            .await?;

        Ok(model.clone())
    }

    /// Model handle, loading it first if startup has not done so
    pub async fn get(&self) -> Result<Arc<dyn SegmentationModel>, AnonymizeError> {
        match self.model.get() {
            Some(model) => Ok(model.clone()),
            None => self.initialize().await,
        }
    }

    /// Model handle if already loaded
    pub fn loaded(&self) -> Option<Arc<dyn SegmentationModel>> {
        self.model.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Number of loads performed by this manager
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    /// Name and device of the loaded model
    pub fn info(&self) -> Option<ModelInfo> {
        self.model.get().map(|model| model.info())
    }
}

impl std::fmt::Debug for SegmentationModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationModelManager")
            .field("source", &self.loader.source())
            .field("loaded", &self.is_loaded())
            .field("load_count", &self.load_count())
            .finish_non_exhaustive()
    }
}

struct PreloadedModel(Arc<dyn SegmentationModel>);

impl ModelLoader for PreloadedModel {
    fn load(&self) -> anyhow::Result<Arc<dyn SegmentationModel>> {
        Ok(self.0.clone())
    }

    fn source(&self) -> String {
        format!("preloaded {}", self.0.info().name)
    }
}
