// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! GET / and GET /health tests, plus CORS headers

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use image_anonymizer::api::{HealthResponse, RootResponse};
use image_anonymizer::{create_app, version, AnonymizeOptions, AppState, SegmentationModelManager};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

use crate::common::{CountingLoader, FixedMaskModel};

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_root_message() {
    let manager = Arc::new(SegmentationModelManager::new(CountingLoader::new()));
    let app = create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())));

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json, serde_json::json!({"message": "Image Anonymization API"}));

    let root: RootResponse = serde_json::from_value(json).unwrap();
    assert_eq!(root.message, "Image Anonymization API");
}

#[tokio::test]
async fn test_root_does_not_load_model() {
    let loader = CountingLoader::new();
    let manager = Arc::new(SegmentationModelManager::new(loader.clone()));
    let app = create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())));

    app.oneshot(get("/")).await.unwrap();
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn test_health_reports_loading_before_initialize() {
    let manager = Arc::new(SegmentationModelManager::new(CountingLoader::new()));
    let app = create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "loading");
    assert!(health.model.is_none());
    assert_eq!(health.version, version::VERSION);
}

#[tokio::test]
async fn test_health_reports_loaded_model() {
    let manager = Arc::new(SegmentationModelManager::with_model(Arc::new(
        FixedMaskModel::full(0.9),
    )));
    let app = create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())));

    let response = app.oneshot(get("/health")).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(health.status, "ok");
    assert_eq!(health.model.as_deref(), Some("fixed-mask"));
    assert_eq!(health.device.as_deref(), Some("cpu"));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let manager = Arc::new(SegmentationModelManager::new(CountingLoader::new()));
    let app = create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let manager = Arc::new(SegmentationModelManager::new(CountingLoader::new()));
    let app = create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())));

    let response = app.oneshot(get("/v1/nothing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
