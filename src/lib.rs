// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod version;
pub mod vision;

pub use api::http_server::{create_app, start_server, AppState};
pub use config::AnonymizerConfig;
pub use vision::{
    segment_and_blur, AnonymizeError, AnonymizeOptions, AnonymizedImage, BoundingBox,
    MaskPrediction, ModelInfo, SegmentPrompt, SegmentationModel, SegmentationModelManager,
};
