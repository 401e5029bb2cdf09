mod common;

use axum::http::StatusCode;
use common::{bare_request, body_json, gateway};
use service_core::middleware::REQUEST_ID_HEADER;
use tower::util::ServiceExt;

#[tokio::test]
async fn health_endpoint_reports_service_identity() {
    let gw = gateway().await;

    let response = gw
        .app
        .oneshot(bare_request("GET", "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "gateway-service");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_text() {
    let gw = gateway().await;

    let response = gw
        .app
        .oneshot(bare_request("GET", "/metrics", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn every_response_carries_a_request_id_and_security_headers() {
    let gw = gateway().await;

    let response = gw
        .app
        .oneshot(bare_request("GET", "/health", None))
        .await
        .unwrap();

    let headers = response.headers();
    assert!(headers.contains_key(REQUEST_ID_HEADER));
    assert_eq!(headers["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn auth_responses_are_never_cached() {
    let gw = gateway().await;

    let response = gw
        .app
        .oneshot(bare_request("GET", "/devices", None))
        .await
        .unwrap();

    assert_eq!(response.headers()["cache-control"], "no-store");
}
