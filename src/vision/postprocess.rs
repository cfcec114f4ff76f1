// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Mask smoothing and blur compositing

use image::{GrayImage, Luma, Rgb, Rgb32FImage, RgbImage};
use imageproc::filter::separable_filter_equal;
use imageproc::morphology::{grayscale_close, Mask};

/// Side of the square structuring element used to close masks
pub const CLOSE_KERNEL_SIZE: u32 = 20;

/// Side of the Gaussian kernel
pub const BLUR_KERNEL_SIZE: usize = 35;

/// Gaussian standard deviation
pub const BLUR_SIGMA: f32 = 50.0;

/// Morphologically close a mask (dilation then erosion) with a 20x20 square
///
/// The element is anchored at (10, 10), so the even-sized square covers
/// offsets -10..=9 on each axis.
pub fn close_mask(mask: &GrayImage) -> GrayImage {
    let element = GrayImage::from_pixel(CLOSE_KERNEL_SIZE, CLOSE_KERNEL_SIZE, Luma([255]));
    let anchor = (CLOSE_KERNEL_SIZE / 2) as u8;
    let structuring = Mask::from_image(&element, anchor, anchor);

    grayscale_close(mask, &structuring)
}

/// Normalized 1D Gaussian weights for an odd `size`
pub fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let center = (size / 2) as f32;
    let denom = 2.0 * sigma * sigma;

    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / denom).exp()
        })
        .collect();

    let sum: f32 = weights.iter().sum();
    for w in weights.iter_mut() {
        *w /= sum;
    }
    weights
}

/// Blur the whole image with a 35x35 Gaussian (sigma 50)
///
/// Both passes run on f32 samples and the result is rounded once, so flat
/// regions come back unchanged.
pub fn gaussian_blur(image: &RgbImage) -> RgbImage {
    let kernel = gaussian_kernel(BLUR_KERNEL_SIZE, BLUR_SIGMA);

    let samples: Rgb32FImage = Rgb32FImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgb([r as f32, g as f32, b as f32])
    });
    let blurred = separable_filter_equal(&samples, &kernel);

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb(channels) = *blurred.get_pixel(x, y);
        Rgb(channels.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}

/// Take `blurred` where `mask` is non-zero and `original` elsewhere
///
/// All three images must share dimensions.
pub fn composite(original: &RgbImage, blurred: &RgbImage, mask: &GrayImage) -> RgbImage {
    debug_assert_eq!(original.dimensions(), blurred.dimensions());
    debug_assert_eq!(original.dimensions(), mask.dimensions());

    let mut output = original.clone();
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] > 0 {
            *pixel = *blurred.get_pixel(x, y);
        }
    }
    output
}

/// Blur the region selected by `mask`
pub fn blur_masked_region(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    let blurred = gaussian_blur(image);
    composite(image, &blurred, mask)
}
