//! HTTP surface tests driven through `tower::ServiceExt::oneshot`.

use super::helpers::{TWO_FEATURES, Workspace};
use super::*;
use crate::server::{ProcessResponse, router};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use geoingest_core::test_support::{MemoryBlobStore, MemoryFeatureStore};
use geoingest_core::{BlobLocation, BlobStore, FeatureStore, Pipeline};
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn memory_app(blobs: MemoryBlobStore, store: MemoryFeatureStore) -> axum::Router {
    let blobs: Box<dyn BlobStore> = Box::new(blobs);
    let store: Box<dyn FeatureStore> = Box::new(store);
    router(Arc::new(Pipeline::new(blobs, store)))
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).expect("JSON body");
    (status, body)
}

fn post_process(body: &str) -> Request<Body> {
    Request::post("/process")
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .expect("build request")
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).expect("build request")
}

#[rstest]
#[tokio::test]
async fn health_reports_service_name() {
    let app = memory_app(MemoryBlobStore::default(), MemoryFeatureStore::default());

    let (status, body) = send(app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "healthy", "service": "geojson-processor"})
    );
}

#[rstest]
#[case(r#"{"bucket": "b"}"#)]
#[case(r#"{"key": "k.geojson"}"#)]
#[case(r#"{"bucket": "", "key": "k.geojson"}"#)]
#[case("not json")]
#[tokio::test]
async fn process_requires_bucket_and_key(#[case] request: &str) {
    let app = memory_app(MemoryBlobStore::default(), MemoryFeatureStore::default());

    let (status, body) = send(app, post_process(request)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "bucket and key are required"}));
}

#[rstest]
#[tokio::test]
async fn process_reports_inserted_features() {
    let blobs = MemoryBlobStore::default().with_blob(BlobLocation::new("b", "k.geojson"), TWO_FEATURES);
    let app = memory_app(blobs, MemoryFeatureStore::default());

    let (status, body) = send(app, post_process(r#"{"bucket": "b", "key": "k.geojson"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let response: ProcessResponse = serde_json::from_value(body).expect("process response");
    assert_eq!(response.message, "Successfully processed k.geojson from b");
    assert_eq!(response.features_inserted, 2);
    assert_eq!(response.rejected, None);
}

#[rstest]
#[tokio::test]
async fn process_answers_rejections_with_ok() {
    let blobs = MemoryBlobStore::default().with_blob(BlobLocation::new("b", "k.geojson"), "{}");
    let app = memory_app(blobs, MemoryFeatureStore::default());

    let (status, body) = send(app, post_process(r#"{"bucket": "b", "key": "k.geojson"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["features_inserted"], 0);
    assert!(body["rejected"].is_string(), "body: {body}");
}

#[rstest]
#[tokio::test]
async fn process_failures_answer_500() {
    let app = memory_app(MemoryBlobStore::default(), MemoryFeatureStore::default());

    let (status, body) = send(app, post_process(r#"{"bucket": "b", "key": "absent"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().expect("error message");
    assert!(message.contains("absent"), "unexpected message {message}");
}

#[rstest]
#[tokio::test]
async fn stats_report_recent_files() {
    let location = BlobLocation::new("b", "k.geojson");
    let blobs = MemoryBlobStore::default().with_blob(location, TWO_FEATURES);
    let app = memory_app(blobs, MemoryFeatureStore::default());

    let (status, _) = send(
        app.clone(),
        post_process(r#"{"bucket": "b", "key": "k.geojson"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(app, get("/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_features"], 2);
    assert_eq!(body["total_files"], 1);
    assert_eq!(body["recent_files"][0]["filename"], "k.geojson");
    assert_eq!(body["recent_files"][0]["feature_count"], 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn process_persists_to_sqlite_end_to_end() {
    let workspace = Workspace::new();
    workspace.put_blob("parks.geojson", TWO_FEATURES);
    let app = router(Arc::new(workspace.pipeline()));

    let (status, body) = send(
        app.clone(),
        post_process(r#"{"bucket": "incoming", "key": "parks.geojson"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let (status, stats) = send(app, get("/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_features"], 2);
    assert_eq!(stats["recent_files"][0]["filename"], "parks.geojson");
}
