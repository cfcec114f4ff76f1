// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading, data-URI handling and re-encoding

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use thiserror::Error;

/// Maximum decoded image size (16MB)
const MAX_IMAGE_SIZE: usize = 16 * 1024 * 1024;

/// Format used when the payload carries no data-URI header
pub const DEFAULT_FORMAT: &str = "jpeg";

/// JPEG quality used when re-encoding
pub const JPEG_QUALITY: u8 = 95;

/// Custom error types for image processing
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Malformed data URI header: {0}")]
    MalformedDataUri(String),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Unknown output format: {0}")]
    UnknownOutputFormat(String),

    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected container format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Image string split into its requested output format and base64 payload
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload<'a> {
    /// Format token from `data:image/<fmt>;base64,`, or `jpeg`
    pub format: String,
    /// Base64 body
    pub data: &'a str,
}

impl ImagePayload<'_> {
    /// `Content-Type` for the re-encoded result
    pub fn media_type(&self) -> String {
        format!("image/{}", self.format)
    }
}

/// Split an image string into format and payload
///
/// Accepts either raw base64 or a data URI. When a comma is present, the part
/// before the first comma is a header such as `data:image/png;base64`; the
/// format is the MIME subtype.
pub fn parse_image_payload(input: &str) -> Result<ImagePayload<'_>, ImageError> {
    let input = input.trim();

    match input.split_once(',') {
        Some((header, data)) => {
            let mime = header.split(';').next().unwrap_or_default();
            let format = mime
                .split_once('/')
                .map(|(_, subtype)| subtype.trim())
                .filter(|subtype| !subtype.is_empty())
                .ok_or_else(|| ImageError::MalformedDataUri(header.to_string()))?;

            Ok(ImagePayload {
                format: format.to_string(),
                data,
            })
        }
        None => Ok(ImagePayload {
            format: DEFAULT_FORMAT.to_string(),
            data: input,
        }),
    }
}

/// Decode a base64-encoded image
///
/// Whitespace inside the payload (line-wrapped base64) is ignored.
///
/// # Example
/// ```ignore
/// let (image, info) = decode_base64_image("iVBORw0KGgo...")?;
/// println!("Image size: {}x{}", info.width, info.height);
/// ```
pub fn decode_base64_image(base64_str: &str) -> Result<(DynamicImage, ImageInfo), ImageError> {
    let compact: String = base64_str
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if compact.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let bytes = STANDARD.decode(compact.as_bytes())?;

    decode_image_bytes(&bytes)
}

/// Decode raw image bytes
pub fn decode_image_bytes(bytes: &[u8]) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Decode an image string (data URI or raw base64) into 8-bit RGB
///
/// Returns the pixels, the load metadata and the format the result should be
/// encoded back into. Any alpha channel is dropped.
pub fn decode_image_payload(
    input: &str,
) -> Result<(RgbImage, ImageInfo, ImagePayload<'_>), ImageError> {
    let payload = parse_image_payload(input)?;
    let (image, info) = decode_base64_image(payload.data)?;
    Ok((image.to_rgb8(), info, payload))
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}

/// Resolve a data-URI format token (`png`, `jpeg`, `jpg`, `webp`...) to an encoder format
pub fn output_format(token: &str) -> Result<ImageFormat, ImageError> {
    let token = token.trim().to_ascii_lowercase();

    ImageFormat::from_extension(&token)
        .or_else(|| ImageFormat::from_mime_type(format!("image/{}", token)))
        .ok_or(ImageError::UnknownOutputFormat(token))
}

/// Encode RGB pixels in the given container format
pub fn encode_image(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
            encoder
                .encode_image(image)
                .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;
        }
        other => {
            image
                .write_to(&mut Cursor::new(&mut buffer), other)
                .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;
        }
    }

    Ok(buffer)
}

/// Get the format extension as a string
pub fn format_to_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        _ => "unknown",
    }
}
