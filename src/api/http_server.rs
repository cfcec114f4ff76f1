// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::segment::segment_handler;
use crate::config::{AnonymizerConfig, DEFAULT_MAX_BODY_BYTES};
use crate::version;
use crate::vision::{AnonymizeOptions, SegmentationModelManager};

/// Shared state handed to every handler
#[derive(Debug)]
pub struct AppState {
    pub model_manager: Arc<SegmentationModelManager>,
    pub options: AnonymizeOptions,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(model_manager: Arc<SegmentationModelManager>, options: AnonymizeOptions) -> Self {
        Self {
            model_manager,
            options,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn from_config(
        config: &AnonymizerConfig,
        model_manager: Arc<SegmentationModelManager>,
    ) -> Self {
        Self {
            model_manager,
            options: config.anonymize_options(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// "ok" once the model is loaded, "loading" before
    pub status: String,
    pub model: Option<String>,
    pub device: Option<String>,
    pub version: String,
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let body_limit = state.max_body_bytes;

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/segment", post(segment_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: &AnonymizerConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = config.socket_addr().map_err(anyhow::Error::msg)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("🚀 Image Anonymization API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn root_handler() -> impl IntoResponse {
    Json(RootResponse {
        message: "Image Anonymization API".to_string(),
    })
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let info = state.model_manager.info();
    let status = if info.is_some() { "ok" } else { "loading" };

    Json(HealthResponse {
        status: status.to_string(),
        model: info.as_ref().map(|i| i.name.clone()),
        device: info.map(|i| i.device),
        version: version::VERSION.to_string(),
    })
}
