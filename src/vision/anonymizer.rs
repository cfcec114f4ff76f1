// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Point-prompted anonymization pipeline
//!
//! decode -> bounding box -> segmentation -> mask closing -> blur composite -> encode

use std::time::Instant;

use image::{GrayImage, ImageFormat, RgbImage};
use thiserror::Error;
use tracing::{debug, info};

use super::image_utils::{self, ImageError, ImageInfo};
use super::postprocess::{blur_masked_region, close_mask};
use super::segmentation::{BoundingBox, SegmentPrompt, SegmentationModel, DEFAULT_BOX_DIVISOR};

/// Errors produced by the anonymization pipeline
#[derive(Debug, Error)]
pub enum AnonymizeError {
    #[error("Invalid image data: {0}")]
    Decode(#[source] ImageError),

    #[error("Point ({x}, {y}) is outside image bounds {width}x{height}")]
    PointOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("{0}")]
    Inference(String),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] ImageError),
}

/// Tunables for a pipeline run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnonymizeOptions {
    /// Bounding box half-extent is `min(width, height) / box_divisor`
    pub box_divisor: u32,
    /// Reject the best mask when its score is below this value
    pub min_confidence: Option<f32>,
}

impl Default for AnonymizeOptions {
    fn default() -> Self {
        Self {
            box_divisor: DEFAULT_BOX_DIVISOR,
            min_confidence: None,
        }
    }
}

/// Encoded result of a pipeline run
#[derive(Debug, Clone)]
pub struct AnonymizedImage {
    /// Encoded image in the input's format
    pub bytes: Vec<u8>,
    /// `image/<fmt>` for the response
    pub media_type: String,
    /// Confidence of the selected mask
    pub score: f32,
    /// Box prior sent to the model
    pub bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
}

/// A decoded upload with its output encoder already resolved
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: RgbImage,
    pub info: ImageInfo,
    pub format: ImageFormat,
    pub media_type: String,
}

/// Decode `image_data` and resolve the format the result will be written in
///
/// `image_data` is a data URI (`data:image/png;base64,...`) or raw base64, in
/// which case the result is encoded as JPEG.
pub fn decode_request_image(image_data: &str) -> Result<DecodedImage, AnonymizeError> {
    let (image, info, payload) =
        image_utils::decode_image_payload(image_data).map_err(AnonymizeError::Decode)?;
    debug!(
        "Decoded {} image {}x{} ({} bytes)",
        image_utils::format_to_extension(info.format),
        info.width,
        info.height,
        info.size_bytes
    );

    // Resolve the output encoder before running the model
    let format = image_utils::output_format(&payload.format).map_err(AnonymizeError::Encode)?;

    Ok(DecodedImage {
        image,
        info,
        format,
        media_type: payload.media_type(),
    })
}

/// Segment the object under `point` and blur it
///
/// See [`decode_request_image`] for the accepted `image_data` forms.
pub fn segment_and_blur(
    model: &dyn SegmentationModel,
    image_data: &str,
    point: (u32, u32),
    options: &AnonymizeOptions,
) -> Result<AnonymizedImage, AnonymizeError> {
    let decoded = decode_request_image(image_data)?;
    anonymize_decoded(model, decoded, point, options)
}

/// Run the pipeline on an already decoded upload and encode the result
pub fn anonymize_decoded(
    model: &dyn SegmentationModel,
    decoded: DecodedImage,
    point: (u32, u32),
    options: &AnonymizeOptions,
) -> Result<AnonymizedImage, AnonymizeError> {
    let start = Instant::now();
    let DecodedImage {
        image,
        info,
        format,
        media_type,
    } = decoded;

    let (result, score, bbox) = anonymize(model, &image, point, options)?;

    let bytes = image_utils::encode_image(&result, format).map_err(AnonymizeError::Encode)?;

    info!(
        "Anonymized {}x{} image at ({}, {}): score={:.3}, {} bytes out, {}ms",
        info.width,
        info.height,
        point.0,
        point.1,
        score,
        bytes.len(),
        start.elapsed().as_millis()
    );

    Ok(AnonymizedImage {
        bytes,
        media_type,
        score,
        bbox,
        width: info.width,
        height: info.height,
    })
}

/// Run segmentation and blur on decoded pixels
///
/// Returns the blurred image, the selected mask's score and the box prior.
pub fn anonymize(
    model: &dyn SegmentationModel,
    image: &RgbImage,
    point: (u32, u32),
    options: &AnonymizeOptions,
) -> Result<(RgbImage, f32, BoundingBox), AnonymizeError> {
    let (width, height) = image.dimensions();
    let (x, y) = point;

    if x >= width || y >= height {
        return Err(AnonymizeError::PointOutOfBounds {
            x,
            y,
            width,
            height,
        });
    }

    let bbox = BoundingBox::around_point(x, y, width, height, options.box_divisor);
    let prompt = SegmentPrompt::foreground(point, bbox);

    let (mask, score) = segment(model, image, &prompt)?;

    if let Some(threshold) = options.min_confidence {
        if score < threshold {
            return Err(AnonymizeError::Inference(format!(
                "Mask confidence {:.3} is below the minimum {:.3}",
                score, threshold
            )));
        }
    }

    let closed = close_mask(&mask);
    Ok((blur_masked_region(image, &closed), score, bbox))
}

fn segment(
    model: &dyn SegmentationModel,
    image: &RgbImage,
    prompt: &SegmentPrompt,
) -> Result<(GrayImage, f32), AnonymizeError> {
    let prediction = model
        .predict(image, prompt)
        .map_err(|e| AnonymizeError::Inference(format!("Segmentation failed: {:#}", e)))?;

    let candidates = prediction.scores.len();
    let (mask, score) = prediction
        .into_best()
        .map_err(|e| AnonymizeError::Inference(e.to_string()))?;

    if mask.dimensions() != image.dimensions() {
        return Err(AnonymizeError::Inference(format!(
            "Mask size {}x{} does not match image size {}x{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )));
    }

    debug!(
        "Selected mask with score {:.3} out of {} candidates",
        score, candidates
    );
    Ok((mask, score))
}
