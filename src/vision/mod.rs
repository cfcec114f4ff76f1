// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for point-prompted anonymization
//!
//! This module provides:
//! - Image decoding/encoding for data-URI and base64 payloads
//! - Object segmentation via SAM 2.1 (ONNX Runtime, CUDA with CPU fallback)
//! - Mask closing and Gaussian blur compositing

pub mod anonymizer;
pub mod image_utils;
pub mod model_manager;
pub mod postprocess;
pub mod sam;
pub mod segmentation;

pub use anonymizer::{
    anonymize, anonymize_decoded, decode_request_image, segment_and_blur, AnonymizeError,
    AnonymizeOptions, AnonymizedImage, DecodedImage,
};
pub use image_utils::{decode_base64_image, decode_image_payload, ImageError, ImageInfo};
pub use model_manager::{ModelLoader, SegmentationModelManager};
pub use segmentation::{
    BoundingBox, MaskPrediction, ModelInfo, PointLabel, SegmentPrompt, SegmentationModel,
};
