// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! SAM 2.1 image encoder and prompt decoder on ONNX Runtime

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array1, ArrayD, Ix4};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::preprocessing::{empty_mask_input, encode_prompt, logits_to_mask, preprocess_image};
use super::Sam2Config;
use crate::vision::segmentation::{
    MaskPrediction, ModelInfo, SegmentPrompt, SegmentationModel,
};

/// Model name reported in logs and `/health`
pub const SAM2_MODEL_NAME: &str = "sam2.1-hiera-small";

/// Execution device of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

/// Encoder outputs reused by the decoder
struct ImageEmbedding {
    image_embed: ArrayD<f32>,
    high_res_feats_0: ArrayD<f32>,
    high_res_feats_1: ArrayD<f32>,
}

/// SAM 2.1 segmentation model
///
/// One encoder pass per request, then one decoder pass with the box and
/// click prompt. Both sessions sit behind a mutex, so concurrent requests
/// run one at a time.
pub struct Sam2Model {
    encoder: Mutex<Session>,
    decoder: Mutex<Session>,
    device: Device,
}

impl std::fmt::Debug for Sam2Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sam2Model")
            .field("name", &SAM2_MODEL_NAME)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl Sam2Model {
    /// Load encoder and decoder sessions
    ///
    /// # Errors
    /// Returns error if:
    /// - Either model file is missing and cannot be downloaded
    /// - ONNX Runtime fails to create a session
    pub fn load(config: &Sam2Config) -> Result<Self> {
        let (encoder_path, decoder_path) = config.resolve_files()?;

        let start = Instant::now();
        let (encoder, device) = build_session(&encoder_path, config)?;
        // Decoder follows the encoder's device
        let decoder_config = Sam2Config {
            force_cpu: config.force_cpu || device == Device::Cpu,
            ..config.clone()
        };
        let (decoder, _) = build_session(&decoder_path, &decoder_config)?;

        info!(
            "✅ SAM 2.1 encoder/decoder loaded on {} in {}ms",
            device.as_str(),
            start.elapsed().as_millis()
        );

        Ok(Self {
            encoder: Mutex::new(encoder),
            decoder: Mutex::new(decoder),
            device,
        })
    }

    fn encode(&self, image: &RgbImage) -> Result<ImageEmbedding> {
        let input = preprocess_image(image);
        let input_value = Value::from_array(input).context("Failed to create image tensor")?;

        let mut session = self
            .encoder
            .lock()
            .map_err(|_| anyhow::anyhow!("Encoder session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs!["image" => input_value])
            .context("Encoder inference failed")?;

        let extract = |name: &str| -> Result<ArrayD<f32>> {
            Ok(outputs[name]
                .try_extract_array::<f32>()
                .with_context(|| format!("Failed to extract encoder output {}", name))?
                .to_owned())
        };

        let embedding = ImageEmbedding {
            image_embed: extract("image_embed")?,
            high_res_feats_0: extract("high_res_feats_0")?,
            high_res_feats_1: extract("high_res_feats_1")?,
        };

        debug!("Image embedding shape: {:?}", embedding.image_embed.shape());
        Ok(embedding)
    }

    fn decode(
        &self,
        embedding: ImageEmbedding,
        prompt: &SegmentPrompt,
        width: u32,
        height: u32,
    ) -> Result<MaskPrediction> {
        let (coords, labels) = encode_prompt(prompt, width, height);

        let mut session = self
            .decoder
            .lock()
            .map_err(|_| anyhow::anyhow!("Decoder session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![
                "image_embed" => Value::from_array(embedding.image_embed)?,
                "high_res_feats_0" => Value::from_array(embedding.high_res_feats_0)?,
                "high_res_feats_1" => Value::from_array(embedding.high_res_feats_1)?,
                "point_coords" => Value::from_array(coords)?,
                "point_labels" => Value::from_array(labels)?,
                "mask_input" => Value::from_array(empty_mask_input())?,
                "has_mask_input" => Value::from_array(Array1::<f32>::zeros(1))?,
            ])
            .context("Decoder inference failed")?;

        let masks = outputs["masks"]
            .try_extract_array::<f32>()
            .context("Failed to extract masks")?;
        let masks = masks
            .into_dimensionality::<Ix4>()
            .context("Decoder masks are not [1, C, H, W]")?;
        let scores = outputs["iou_predictions"]
            .try_extract_array::<f32>()
            .context("Failed to extract iou_predictions")?;

        let candidates = masks.shape()[1];
        let scores: Vec<f32> = scores.iter().copied().take(candidates).collect();

        let mut selected = if prompt.multimask {
            (0..candidates).collect::<Vec<_>>()
        } else {
            vec![0]
        };
        selected.retain(|&c| c < scores.len());

        let mut prediction = MaskPrediction::default();
        for c in selected {
            let logits = masks.slice(ndarray::s![0, c, .., ..]);
            prediction.masks.push(logits_to_mask(logits, width, height));
            prediction.scores.push(scores[c]);
        }

        debug!("Decoder scores: {:?}", prediction.scores);
        Ok(prediction)
    }
}

impl SegmentationModel for Sam2Model {
    fn predict(&self, image: &RgbImage, prompt: &SegmentPrompt) -> Result<MaskPrediction> {
        let (width, height) = image.dimensions();
        let start = Instant::now();

        let embedding = self.encode(image)?;
        let encode_ms = start.elapsed().as_millis();

        let prediction = self.decode(embedding, prompt, width, height)?;

        debug!(
            "SAM inference: encode {}ms, total {}ms",
            encode_ms,
            start.elapsed().as_millis()
        );
        Ok(prediction)
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: SAM2_MODEL_NAME.to_string(),
            device: self.device.as_str().to_string(),
        }
    }
}

/// Create a session, trying CUDA first unless the config forces CPU
fn build_session(model_path: &Path, config: &Sam2Config) -> Result<(Session, Device)> {
    if !config.force_cpu {
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default()
                .build()
                .error_on_failure()])
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(config.intra_threads))
            .and_then(|b| b.commit_from_file(model_path));

        match cuda_result {
            Ok(session) => {
                info!("✅ CUDA execution provider initialized for {}", model_path.display());
                return Ok((session, Device::Cuda));
            }
            Err(e) => {
                warn!("⚠️  CUDA execution provider failed: {}", e);
                warn!("   Falling back to CPU execution provider");
            }
        }
    }

    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(config.intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load SAM model from {}",
            model_path.display()
        ))?;

    Ok((session, Device::Cpu))
}
