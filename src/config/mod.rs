// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration for the anonymization API

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::vision::sam::Sam2Config;
use crate::vision::segmentation::DEFAULT_BOX_DIVISOR;
use crate::vision::AnonymizeOptions;

/// Default model directory holding the SAM 2.1 (hiera-small) ONNX exports
pub const DEFAULT_MODEL_DIR: &str = "./models/sam2.1-hiera-small-onnx";

/// Default request body limit (base64 images are ~4/3 of the raw size)
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Configuration for the anonymization service
#[derive(Debug, Clone, PartialEq)]
pub struct AnonymizerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Directory containing the encoder/decoder ONNX files
    pub model_dir: PathBuf,
    /// Encoder file name inside `model_dir`
    pub encoder_file: String,
    /// Decoder file name inside `model_dir`
    pub decoder_file: String,
    /// Hugging Face repo to fetch the ONNX files from when missing locally
    pub hf_repo: Option<String>,
    /// Skip the CUDA execution provider
    pub force_cpu: bool,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Bounding box half-extent is `min(width, height) / box_divisor`
    pub box_divisor: u32,
    /// Reject masks scoring below this value (None accepts any score)
    pub min_confidence: Option<f32>,
    /// Maximum accepted request body size
    pub max_body_bytes: usize,
}

impl AnonymizerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        fn parse_value<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|v| v.trim().parse().ok())
        }

        Self {
            host: lookup("ANONYMIZER_HOST").unwrap_or(defaults.host),
            port: parse_value(lookup("ANONYMIZER_PORT")).unwrap_or(defaults.port),
            model_dir: lookup("SAM_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            encoder_file: lookup("SAM_ENCODER_FILE").unwrap_or(defaults.encoder_file),
            decoder_file: lookup("SAM_DECODER_FILE").unwrap_or(defaults.decoder_file),
            hf_repo: lookup("SAM_HF_REPO").filter(|v| !v.trim().is_empty()),
            force_cpu: lookup("SAM_FORCE_CPU")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.force_cpu),
            intra_threads: parse_value(lookup("SAM_INTRA_THREADS")).unwrap_or(defaults.intra_threads),
            box_divisor: parse_value(lookup("BOX_DIVISOR")).unwrap_or(defaults.box_divisor),
            min_confidence: parse_value(lookup("MIN_MASK_CONFIDENCE")),
            max_body_bytes: parse_value(lookup("MAX_BODY_BYTES")).unwrap_or(defaults.max_body_bytes),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port must be greater than 0".to_string());
        }
        if self.box_divisor == 0 {
            return Err("Box divisor must be greater than 0".to_string());
        }
        if self.intra_threads == 0 {
            return Err("Intra-op thread count must be greater than 0".to_string());
        }
        if self.max_body_bytes == 0 {
            return Err("Max body size must be greater than 0".to_string());
        }
        if let Some(threshold) = self.min_confidence {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(format!(
                    "Minimum mask confidence must be within [0, 1], got {}",
                    threshold
                ));
            }
        }
        self.socket_addr()?;
        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid listen address {}:{}: {}", self.host, self.port, e))
    }

    /// Settings for loading the SAM 2.1 ONNX model
    pub fn sam_config(&self) -> Sam2Config {
        Sam2Config {
            model_dir: self.model_dir.clone(),
            encoder_file: self.encoder_file.clone(),
            decoder_file: self.decoder_file.clone(),
            hf_repo: self.hf_repo.clone(),
            force_cpu: self.force_cpu,
            intra_threads: self.intra_threads,
        }
    }

    /// Per-request pipeline options
    pub fn anonymize_options(&self) -> AnonymizeOptions {
        AnonymizeOptions {
            box_divisor: self.box_divisor,
            min_confidence: self.min_confidence,
        }
    }
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            encoder_file: "encoder.onnx".to_string(),
            decoder_file: "decoder.onnx".to_string(),
            hf_repo: None,
            force_cpu: false,
            intra_threads: 4,
            box_divisor: DEFAULT_BOX_DIVISOR,
            min_confidence: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
