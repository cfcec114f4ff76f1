// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared test doubles and image helpers
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use image_anonymizer::vision::image_utils::encode_image;
use image_anonymizer::vision::ModelLoader;
use image_anonymizer::{MaskPrediction, ModelInfo, SegmentPrompt, SegmentationModel};

/// Rectangle `[x0, x1) x [y0, y1)` in pixels
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Distance from `(x, y)` to the rectangle border, 0 on the border itself
    pub fn border_distance(&self, x: u32, y: u32) -> u32 {
        let (x, y) = (x as i64, y as i64);
        let (x0, y0, x1, y1) = (
            self.x0 as i64,
            self.y0 as i64,
            self.x1 as i64 - 1,
            self.y1 as i64 - 1,
        );
        let d = if self.contains(x as u32, y as u32) {
            (x - x0).min(x1 - x).min(y - y0).min(y1 - y)
        } else {
            let dx = (x0 - x).max(x - x1).max(0);
            let dy = (y0 - y).max(y - y1).max(0);
            dx.max(dy)
        };
        d as u32
    }
}

/// Model that returns one rectangular mask (or the whole image) with a fixed score
pub struct FixedMaskModel {
    pub rect: Option<Rect>,
    pub score: f32,
    pub calls: AtomicUsize,
    pub last_prompt: Mutex<Option<SegmentPrompt>>,
}

impl FixedMaskModel {
    pub fn rect(rect: Rect, score: f32) -> Self {
        Self {
            rect: Some(rect),
            score,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Mask covering the full image
    pub fn full(score: f32) -> Self {
        Self {
            rect: None,
            score,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<SegmentPrompt> {
        self.last_prompt.lock().unwrap().clone()
    }
}

impl SegmentationModel for FixedMaskModel {
    fn predict(&self, image: &RgbImage, prompt: &SegmentPrompt) -> anyhow::Result<MaskPrediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());

        let (width, height) = image.dimensions();
        let mask = GrayImage::from_fn(width, height, |x, y| match self.rect {
            Some(rect) if !rect.contains(x, y) => Luma([0]),
            _ => Luma([255]),
        });

        // A weaker empty candidate first, to exercise best-score selection
        Ok(MaskPrediction {
            masks: vec![GrayImage::new(width, height), mask],
            scores: vec![self.score / 2.0, self.score],
        })
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "fixed-mask".to_string(),
            device: "cpu".to_string(),
        }
    }
}

/// Model whose inference always fails
pub struct FailingModel;

impl SegmentationModel for FailingModel {
    fn predict(&self, _image: &RgbImage, _prompt: &SegmentPrompt) -> anyhow::Result<MaskPrediction> {
        anyhow::bail!("decoder session crashed")
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "failing".to_string(),
            device: "cpu".to_string(),
        }
    }
}

/// Loader counting how often it builds a model
pub struct CountingLoader {
    pub loads: AtomicUsize,
    pub delay: Duration,
    pub fail: bool,
}

impl CountingLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
            delay,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: true,
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self) -> anyhow::Result<Arc<dyn SegmentationModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if self.fail {
            anyhow::bail!("SAM model file not found: /nowhere/encoder.onnx");
        }
        Ok(Arc::new(FixedMaskModel::full(0.9)))
    }

    fn source(&self) -> String {
        "counting-loader".to_string()
    }
}

/// Checkerboard with `cell`-pixel squares
pub fn checkerboard(width: u32, height: u32, cell: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Checkerboard with a solid red square over `rect`
pub fn checkerboard_with_square(width: u32, height: u32, rect: Rect) -> RgbImage {
    let mut image = checkerboard(width, height, 2);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if rect.contains(x, y) {
            *pixel = Rgb([200, 30, 30]);
        }
    }
    image
}

pub fn png_base64(image: &RgbImage) -> String {
    STANDARD.encode(encode_image(image, ImageFormat::Png).unwrap())
}

pub fn png_data_uri(image: &RgbImage) -> String {
    format!("data:image/png;base64,{}", png_base64(image))
}

pub fn jpeg_data_uri(image: &RgbImage) -> String {
    let bytes = encode_image(image, ImageFormat::Jpeg).unwrap();
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}

/// Decode PNG bytes to RGB
pub fn decode_png(bytes: &[u8]) -> RgbImage {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .unwrap()
        .to_rgb8()
}
