// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segmentation model contract
//!
//! A model receives the full image, a box prior and one labelled click, and
//! returns several candidate masks with a confidence score for each.

use anyhow::Result;
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Default divisor for the bounding box half-extent (quarter of the smaller side)
pub const DEFAULT_BOX_DIVISOR: u32 = 4;

/// Axis-aligned box in pixel coordinates, `[x_min, x_max] x [y_min, y_max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    /// Box centered on `(x, y)` with half-extent `min(width, height) / divisor`,
    /// clamped to `[0, width] x [0, height]`
    pub fn around_point(x: u32, y: u32, width: u32, height: u32, divisor: u32) -> Self {
        let box_size = width.min(height) / divisor.max(1);

        Self {
            x_min: x.saturating_sub(box_size),
            y_min: y.saturating_sub(box_size),
            x_max: x.saturating_add(box_size).min(width),
            y_max: y.saturating_add(box_size).min(height),
        }
    }

    pub fn width(&self) -> u32 {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> u32 {
        self.y_max.saturating_sub(self.y_min)
    }

    /// True when the box has zero area
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Label attached to a prompt point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointLabel {
    /// Point lies inside the object
    Foreground,
}

impl PointLabel {
    /// Numeric label understood by SAM-family decoders
    pub fn value(self) -> f32 {
        match self {
            PointLabel::Foreground => 1.0,
        }
    }
}

/// Prompt for a single segmentation call
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPrompt {
    /// Clicked pixel `(x, y)`
    pub point: (u32, u32),
    /// Label for `point`
    pub label: PointLabel,
    /// Spatial prior around the point
    pub bbox: BoundingBox,
    /// Ask the model for several mask hypotheses
    pub multimask: bool,
}

impl SegmentPrompt {
    /// Foreground click with a box prior, requesting multiple candidates
    pub fn foreground(point: (u32, u32), bbox: BoundingBox) -> Self {
        Self {
            point,
            label: PointLabel::Foreground,
            bbox,
            multimask: true,
        }
    }
}

/// Candidate masks returned by a model, aligned with their scores
///
/// Masks are image-sized, 255 inside the object and 0 outside.
#[derive(Debug, Clone, Default)]
pub struct MaskPrediction {
    pub masks: Vec<GrayImage>,
    pub scores: Vec<f32>,
}

impl MaskPrediction {
    /// Index of the highest-scoring candidate (first one on ties)
    pub fn best_index(&self) -> Option<usize> {
        self.scores
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, &score)| match best {
                Some((_, best_score)) if best_score >= score || score.is_nan() => best,
                _ => Some((i, score)),
            })
            .map(|(i, _)| i)
    }

    /// Take the highest-scoring mask and its score
    pub fn into_best(mut self) -> Result<(GrayImage, f32)> {
        if self.masks.len() != self.scores.len() {
            anyhow::bail!(
                "Model returned {} masks but {} scores",
                self.masks.len(),
                self.scores.len()
            );
        }

        let index = self
            .best_index()
            .ok_or_else(|| anyhow::anyhow!("Model returned no mask candidates"))?;
        let score = self.scores[index];
        Ok((self.masks.swap_remove(index), score))
    }
}

/// Identity of a loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name
    pub name: String,
    /// Execution device ("cuda" or "cpu")
    pub device: String,
}

/// Point-prompted segmentation model
///
/// Implementations must be safe to call from several request threads; the
/// SAM implementation serializes calls internally.
#[cfg_attr(test, mockall::automock)]
pub trait SegmentationModel: Send + Sync {
    /// Predict candidate masks for `prompt` on `image`
    fn predict(&self, image: &RgbImage, prompt: &SegmentPrompt) -> Result<MaskPrediction>;

    /// Name and device of the model
    fn info(&self) -> ModelInfo;
}
