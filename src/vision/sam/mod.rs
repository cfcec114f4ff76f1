// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! SAM 2.1 segmentation on ONNX Runtime
//!
//! The model is split into two graphs:
//! - `encoder.onnx`: 1024x1024 image -> image embedding + high resolution features
//! - `decoder.onnx`: embedding + box/point prompt -> candidate mask logits and IoU scores

pub mod model;
pub mod preprocessing;

pub use model::{Device, Sam2Model, SAM2_MODEL_NAME};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::DEFAULT_MODEL_DIR;
use crate::vision::model_manager::ModelLoader;
use crate::vision::segmentation::SegmentationModel;

/// Settings for loading the SAM 2.1 encoder/decoder pair
#[derive(Debug, Clone, PartialEq)]
pub struct Sam2Config {
    /// Directory containing the ONNX files
    pub model_dir: PathBuf,
    /// Encoder file name inside `model_dir`
    pub encoder_file: String,
    /// Decoder file name inside `model_dir`
    pub decoder_file: String,
    /// Hugging Face repo to download missing files from
    pub hf_repo: Option<String>,
    /// Skip CUDA
    pub force_cpu: bool,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for Sam2Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            encoder_file: "encoder.onnx".to_string(),
            decoder_file: "decoder.onnx".to_string(),
            hf_repo: None,
            force_cpu: false,
            intra_threads: 4,
        }
    }
}

impl Sam2Config {
    pub fn encoder_path(&self) -> PathBuf {
        self.model_dir.join(&self.encoder_file)
    }

    pub fn decoder_path(&self) -> PathBuf {
        self.model_dir.join(&self.decoder_file)
    }

    /// Local paths of the encoder and decoder
    ///
    /// Files missing from `model_dir` are fetched from `hf_repo` (into the
    /// Hugging Face cache) when one is configured.
    pub fn resolve_files(&self) -> Result<(PathBuf, PathBuf)> {
        let encoder = self.resolve_file(&self.encoder_path(), &self.encoder_file)?;
        let decoder = self.resolve_file(&self.decoder_path(), &self.decoder_file)?;
        Ok((encoder, decoder))
    }

    fn resolve_file(&self, local: &Path, file_name: &str) -> Result<PathBuf> {
        if local.exists() {
            return Ok(local.to_path_buf());
        }

        let Some(repo) = &self.hf_repo else {
            anyhow::bail!("SAM model file not found: {}", local.display());
        };

        info!("📥 Downloading {} from {}", file_name, repo);
        let api = hf_hub::api::sync::Api::new().context("Failed to create Hugging Face client")?;
        api.model(repo.clone())
            .get(file_name)
            .with_context(|| format!("Failed to download {} from {}", file_name, repo))
    }
}

/// Loads [`Sam2Model`] for the model manager
#[derive(Debug, Clone)]
pub struct Sam2Loader {
    config: Sam2Config,
}

impl Sam2Loader {
    pub fn new(config: Sam2Config) -> Self {
        Self { config }
    }
}

impl ModelLoader for Sam2Loader {
    fn load(&self) -> Result<Arc<dyn SegmentationModel>> {
        let model = Sam2Model::load(&self.config)?;
        Ok(Arc::new(model))
    }

    fn source(&self) -> String {
        match &self.config.hf_repo {
            Some(repo) => format!("{} (fallback: {})", self.config.model_dir.display(), repo),
            None => self.config.model_dir.display().to_string(),
        }
    }
}
