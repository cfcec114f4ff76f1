// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;

use crate::config::AnonymizerConfig;

/// Image Anonymization API server
///
/// Every flag is bound to its environment variable; a flag given on the
/// command line wins over the variable.
#[derive(Parser, Debug, Default)]
#[command(name = "image-anonymizer")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Blur the object under a clicked point using SAM 2.1", long_about = None)]
pub struct Cli {
    /// Interface to bind
    #[arg(long, env = "ANONYMIZER_HOST")]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long, env = "ANONYMIZER_PORT")]
    pub port: Option<u16>,

    /// Directory holding encoder.onnx and decoder.onnx
    #[arg(long, env = "SAM_MODEL_DIR", value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Hugging Face repo to download missing ONNX files from
    #[arg(long, env = "SAM_HF_REPO", value_name = "REPO")]
    pub hf_repo: Option<String>,

    /// Run inference on CPU even if CUDA is available
    #[arg(long, env = "SAM_FORCE_CPU")]
    pub cpu: bool,

    /// Bounding box divisor applied to the smaller image side
    #[arg(long, env = "BOX_DIVISOR", value_name = "N")]
    pub box_divisor: Option<u32>,

    /// Reject masks whose confidence is below this value
    #[arg(long, env = "MIN_MASK_CONFIDENCE", value_name = "SCORE")]
    pub min_confidence: Option<f32>,
}

impl Cli {
    /// Apply command line overrides on top of an env-derived configuration
    pub fn apply(self, mut config: AnonymizerConfig) -> AnonymizerConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.model_dir {
            config.model_dir = dir;
        }
        if let Some(repo) = self.hf_repo.filter(|r| !r.trim().is_empty()) {
            config.hf_repo = Some(repo);
        }
        if self.cpu {
            config.force_cpu = true;
        }
        if let Some(divisor) = self.box_divisor {
            config.box_divisor = divisor;
        }
        if self.min_confidence.is_some() {
            config.min_confidence = self.min_confidence;
        }
        config
    }
}
