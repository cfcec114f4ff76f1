// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segment request types

use serde::{Deserialize, Serialize};

/// Pixel coordinate of the click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPayload {
    pub x: u32,
    pub y: u32,
}

impl From<PointPayload> for (u32, u32) {
    fn from(point: PointPayload) -> Self {
        (point.x, point.y)
    }
}

/// Request body for POST /segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRequest {
    /// Data URI (`data:image/png;base64,...`) or raw base64
    pub image: String,

    /// Pixel inside the object to blur
    pub point: PointPayload,
}
