// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segment-and-blur endpoint module
//!
//! Provides POST /segment for blurring the object under a clicked point.

pub mod handler;
pub mod request;

pub use handler::segment_handler;
pub use request::{PointPayload, SegmentRequest};
