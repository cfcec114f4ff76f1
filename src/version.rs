// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Image Anonymization Service

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-sam2-point-blur-2025-11-03";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 0;

/// Minor version number
pub const VERSION_MINOR: u32 = 1;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2025-11-03";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "point-segmentation",
    "sam2.1-onnx",
    "mask-closing",
    "gaussian-blur",
    "data-uri-format-passthrough",
    "cuda-auto-select",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Image Anonymization API {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
