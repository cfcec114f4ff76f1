// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vision::AnonymizeError;

/// Error body: `{"detail": "<message>"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    InvalidImage,
    InvalidRequest(String),
    ModelUnavailable(String),
    InferenceFailed(String),
    EncodeFailed,
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let detail = match self {
            ApiError::InvalidImage => "Invalid image data".to_string(),
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::ModelUnavailable(msg) => msg.clone(),
            ApiError::InferenceFailed(msg) => msg.clone(),
            ApiError::EncodeFailed => "Failed to encode image".to_string(),
            ApiError::InternalError(msg) => msg.clone(),
        };

        ErrorResponse { detail }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidImage | ApiError::InvalidRequest(_) => 400,
            ApiError::ModelUnavailable(_)
            | ApiError::InferenceFailed(_)
            | ApiError::EncodeFailed
            | ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidImage => write!(f, "Invalid image data"),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            ApiError::InferenceFailed(msg) => write!(f, "Inference failed: {}", msg),
            ApiError::EncodeFailed => write!(f, "Failed to encode image"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<AnonymizeError> for ApiError {
    fn from(err: AnonymizeError) -> Self {
        match err {
            AnonymizeError::Decode(_) => ApiError::InvalidImage,
            e @ AnonymizeError::PointOutOfBounds { .. } => ApiError::InvalidRequest(e.to_string()),
            AnonymizeError::ModelLoad(msg) => ApiError::ModelUnavailable(msg),
            AnonymizeError::Inference(msg) => ApiError::InferenceFailed(msg),
            AnonymizeError::Encode(_) => ApiError::EncodeFailed,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
