// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /segment tests
//!
//! The router is driven with `oneshot` and a deterministic model double, so
//! no ONNX files are needed.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use image_anonymizer::api::ErrorResponse;
use image_anonymizer::vision::postprocess::gaussian_blur;
use image_anonymizer::{
    create_app, AnonymizeOptions, AppState, SegmentationModel, SegmentationModelManager,
};
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use crate::common::{
    checkerboard, decode_png, png_data_uri, CountingLoader, FailingModel, FixedMaskModel,
};

/// Helper: router around an already-built model
fn app_with_model(model: Arc<dyn SegmentationModel>) -> Router {
    let manager = Arc::new(SegmentationModelManager::with_model(model));
    create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())))
}

fn segment_request(body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/segment")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn error_detail(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
    error.detail
}

#[tokio::test]
async fn test_png_round_trip() {
    let image = checkerboard(40, 30, 2);
    let app = app_with_model(Arc::new(FixedMaskModel::full(0.9)));

    let body = json!({"image": png_data_uri(&image), "point": {"x": 20, "y": 15}});
    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let output = decode_png(&bytes);
    assert_eq!(output.dimensions(), (40, 30));
    assert_eq!(output, gaussian_blur(&image));
}

#[tokio::test]
async fn test_malformed_base64_returns_400() {
    let app = app_with_model(Arc::new(FixedMaskModel::full(0.9)));

    let body = json!({"image": "data:image/png;base64,%%%not-base64%%%", "point": {"x": 1, "y": 1}});
    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_detail(response).await, "Invalid image data");
}

#[tokio::test]
async fn test_non_image_bytes_return_400() {
    let app = app_with_model(Arc::new(FixedMaskModel::full(0.9)));

    // Valid base64 of plain text
    let body = json!({"image": "data:image/png;base64,aGVsbG8gd29ybGQ=", "point": {"x": 1, "y": 1}});
    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_detail(response).await, "Invalid image data");
}

#[tokio::test]
async fn test_point_outside_image_returns_400() {
    let image = checkerboard(16, 16, 2);
    let model = Arc::new(FixedMaskModel::full(0.9));
    let app = app_with_model(model.clone());

    let body = json!({"image": png_data_uri(&image), "point": {"x": 16, "y": 3}});
    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_detail(response).await.contains("outside image bounds 16x16"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_inference_failure_returns_500() {
    let image = checkerboard(16, 16, 2);
    let app = app_with_model(Arc::new(FailingModel));

    let body = json!({"image": png_data_uri(&image), "point": {"x": 3, "y": 3}});
    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_detail(response).await.contains("decoder session crashed"));
}

#[tokio::test]
async fn test_unknown_output_format_returns_500() {
    let image = checkerboard(16, 16, 2);
    let app = app_with_model(Arc::new(FixedMaskModel::full(0.9)));

    let data_uri = png_data_uri(&image).replacen("image/png", "image/x-unknown", 1);
    let body = json!({"image": data_uri, "point": {"x": 3, "y": 3}});
    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_detail(response).await, "Failed to encode image");
}

#[tokio::test]
async fn test_model_load_failure_returns_500() {
    let manager = Arc::new(SegmentationModelManager::new(CountingLoader::failing()));
    let app = create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())));

    let image = checkerboard(16, 16, 2);
    let body = json!({"image": png_data_uri(&image), "point": {"x": 3, "y": 3}});
    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_detail(response).await.contains("not found"));
}

#[tokio::test]
async fn test_invalid_image_is_400_even_when_model_cannot_load() {
    let loader = CountingLoader::failing();
    let manager = Arc::new(SegmentationModelManager::new(loader.clone()));
    let app = create_app(Arc::new(AppState::new(manager, AnonymizeOptions::default())));

    let body = json!({"image": "data:image/png;base64,%%%not-base64%%%", "point": {"x": 1, "y": 1}});
    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_detail(response).await, "Invalid image data");
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn test_missing_point_is_rejected() {
    let app = app_with_model(Arc::new(FixedMaskModel::full(0.9)));

    let response = app
        .oneshot(segment_request(r#"{"image": "AAAA"}"#.to_string()))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let app = app_with_model(Arc::new(FixedMaskModel::full(0.9)));

    let response = app
        .oneshot(segment_request("{not json".to_string()))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let manager = Arc::new(SegmentationModelManager::with_model(Arc::new(
        FixedMaskModel::full(0.9),
    )));
    let mut state = AppState::new(manager, AnonymizeOptions::default());
    state.max_body_bytes = 256;
    let app = create_app(Arc::new(state));

    let body = json!({"image": "A".repeat(4096), "point": {"x": 3, "y": 3}});

    let response = app.oneshot(segment_request(body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_get_on_segment_not_allowed() {
    let app = app_with_model(Arc::new(FixedMaskModel::full(0.9)));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/segment")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_model_loaded_once_across_requests() {
    let loader = CountingLoader::new();
    let manager = Arc::new(SegmentationModelManager::new(loader.clone()));
    let app = create_app(Arc::new(AppState::new(
        manager.clone(),
        AnonymizeOptions::default(),
    )));

    let image = checkerboard(24, 24, 2);
    for i in 0..5 {
        let body = json!({"image": png_data_uri(&image), "point": {"x": i, "y": i}});
        let response = app
            .clone()
            .oneshot(segment_request(body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(loader.loads(), 1);
    assert_eq!(manager.load_count(), 1);
}
