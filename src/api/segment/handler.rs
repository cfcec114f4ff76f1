// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segment endpoint handler

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use super::request::SegmentRequest;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{anonymize_decoded, decode_request_image, AnonymizeError};

/// POST /segment - Blur the object under a point
///
/// # Request
/// - `image`: Data URI (`data:image/<fmt>;base64,...`) or raw base64 (treated as JPEG output)
/// - `point`: `{"x": u32, "y": u32}` pixel inside the object
///
/// # Response
/// Raw image bytes in the input's format with `Content-Type: image/<fmt>`.
///
/// # Errors
/// - 400 Bad Request: undecodable image or point outside the image
/// - 500 Internal Server Error: model load, inference or encoding failed
pub async fn segment_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SegmentRequest>,
) -> Result<Response, ApiError> {
    debug!(
        "Segment request at ({}, {}), {} bytes of image data",
        request.point.x,
        request.point.y,
        request.image.len()
    );

    // Decode first so a bad upload is a 400 even when the model cannot load
    let image = request.image;
    let decoded = tokio::task::spawn_blocking(move || decode_request_image(&image))
        .await
        .map_err(join_failure)?
        .map_err(log_failure)?;

    let model = state.model_manager.get().await.map_err(log_failure)?;
    let options = state.options;
    let point = request.point.into();

    // Inference and blur are CPU-bound
    let result = tokio::task::spawn_blocking(move || {
        anonymize_decoded(model.as_ref(), decoded, point, &options)
    })
    .await
    .map_err(join_failure)?
    .map_err(log_failure)?;

    Ok(([(header::CONTENT_TYPE, result.media_type)], result.bytes).into_response())
}

fn join_failure(err: tokio::task::JoinError) -> ApiError {
    error!("Segment task failed: {}", err);
    ApiError::InternalError(format!("Segment task failed: {}", err))
}

fn log_failure(err: AnonymizeError) -> ApiError {
    match &err {
        AnonymizeError::Decode(_) | AnonymizeError::PointOutOfBounds { .. } => {
            warn!("Rejected segment request: {}", err)
        }
        _ => error!("Segment request failed: {}", err),
    }
    err.into()
}
