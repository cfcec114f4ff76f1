// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image and prompt preprocessing for SAM 2.1

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use ndarray::{Array2, Array3, Array4, ArrayView2};

use crate::vision::segmentation::SegmentPrompt;

/// Side of the square image the encoder expects
pub const SAM_INPUT_SIZE: u32 = 1024;

/// Side of the low-resolution mask prompt
pub const MASK_INPUT_SIZE: usize = 256;

/// ImageNet normalization mean values
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet normalization std values
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decoder label for the top-left box corner
pub const BOX_TOP_LEFT_LABEL: f32 = 2.0;

/// Decoder label for the bottom-right box corner
pub const BOX_BOTTOM_RIGHT_LABEL: f32 = 3.0;

/// Preprocess an image for the SAM encoder
///
/// Steps:
/// 1. Resize to SAM_INPUT_SIZE x SAM_INPUT_SIZE (aspect ratio is not kept)
/// 2. Normalize with ImageNet mean/std: (pixel/255 - mean) / std
/// 3. Convert to NCHW tensor format [1, 3, H, W]
pub fn preprocess_image(image: &RgbImage) -> Array4<f32> {
    let resized = imageops::resize(image, SAM_INPUT_SIZE, SAM_INPUT_SIZE, FilterType::Triangle);

    let size = SAM_INPUT_SIZE as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    tensor
}

/// Encode a prompt as decoder point coordinates `[1, 3, 2]` and labels `[1, 3]`
///
/// Order is box top-left, box bottom-right, click. Coordinates are scaled
/// from image space to the encoder's 1024x1024 space.
pub fn encode_prompt(prompt: &SegmentPrompt, width: u32, height: u32) -> (Array3<f32>, Array2<f32>) {
    let sx = SAM_INPUT_SIZE as f32 / width.max(1) as f32;
    let sy = SAM_INPUT_SIZE as f32 / height.max(1) as f32;
    let bbox = &prompt.bbox;

    let points = [
        (bbox.x_min as f32, bbox.y_min as f32, BOX_TOP_LEFT_LABEL),
        (bbox.x_max as f32, bbox.y_max as f32, BOX_BOTTOM_RIGHT_LABEL),
        (prompt.point.0 as f32, prompt.point.1 as f32, prompt.label.value()),
    ];

    let mut coords = Array3::zeros((1, points.len(), 2));
    let mut labels = Array2::zeros((1, points.len()));
    for (i, (x, y, label)) in points.iter().enumerate() {
        coords[[0, i, 0]] = x * sx;
        coords[[0, i, 1]] = y * sy;
        labels[[0, i]] = *label;
    }

    (coords, labels)
}

/// Empty mask prompt `[1, 1, 256, 256]`
pub fn empty_mask_input() -> Array4<f32> {
    Array4::zeros((1, 1, MASK_INPUT_SIZE, MASK_INPUT_SIZE))
}

/// Resize decoder logits to the image size and binarize at 0.0
pub fn logits_to_mask(logits: ArrayView2<f32>, width: u32, height: u32) -> GrayImage {
    let (rows, cols) = logits.dim();
    let plane: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
            Luma([logits[[y as usize, x as usize]]])
        });

    let plane = if (cols as u32, rows as u32) == (width, height) {
        plane
    } else {
        imageops::resize(&plane, width, height, FilterType::Triangle)
    };

    GrayImage::from_fn(width, height, |x, y| {
        if plane.get_pixel(x, y)[0] > 0.0 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
