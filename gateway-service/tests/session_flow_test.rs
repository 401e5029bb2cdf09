//! End-to-end device lifecycle: sign in from two devices, inspect the
//! registry, log out the other device, then revoke explicitly.

mod common;

use axum::http::StatusCode;
use common::{bare_request, body_json, gateway, json_request, STUDENT_EMAIL, STUDENT_TOKEN};
use serde_json::json;
use tower::util::ServiceExt;

fn session_body(device_id: &str) -> serde_json::Value {
    json!({ "email": STUDENT_EMAIL, "deviceId": device_id })
}

#[tokio::test]
async fn first_device_establishes_a_single_device_session() {
    let gw = gateway().await;

    let response = gw
        .app
        .oneshot(json_request(
            "POST",
            "/auth/session",
            Some(STUDENT_TOKEN),
            session_body("dev-1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deviceCount"], 1);
    assert_eq!(body["hasMultipleDevices"], false);
}

#[tokio::test]
async fn second_device_flags_multiple_sessions() {
    let gw = gateway().await;

    for device in ["dev-1", "dev-2"] {
        let response = gw
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/session",
                Some(STUDENT_TOKEN),
                session_body(device),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = gw
        .app
        .oneshot(bare_request("GET", "/devices", Some(STUDENT_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deviceCount"], 2);
    assert_eq!(body["hasMultipleDevices"], true);
    assert_eq!(body["devices"], json!(["dev-1", "dev-2"]));
}

#[tokio::test]
async fn repeated_sign_in_from_same_device_is_idempotent() {
    let gw = gateway().await;

    for _ in 0..3 {
        let response = gw
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/session",
                Some(STUDENT_TOKEN),
                session_body("dev-1"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["deviceCount"], 1);
        assert_eq!(body["hasMultipleDevices"], false);
    }
}

#[tokio::test]
async fn logout_others_keeps_only_the_calling_device() {
    let gw = gateway().await;

    for device in ["dev-1", "dev-2"] {
        gw.app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/session",
                Some(STUDENT_TOKEN),
                session_body(device),
            ))
            .await
            .unwrap();
    }

    let response = gw
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/devices/logout-others",
            Some(STUDENT_TOKEN),
            json!({ "currentDeviceId": "dev-2" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["loggedOutDevices"], 1);
    assert_eq!(body["currentDevice"], "dev-2");

    let response = gw
        .app
        .oneshot(bare_request("GET", "/devices", Some(STUDENT_TOKEN)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["deviceCount"], 1);
    assert_eq!(body["devices"], json!(["dev-2"]));
}

#[tokio::test]
async fn revoking_a_registered_device_removes_it() {
    let gw = gateway().await;

    gw.app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/session",
            Some(STUDENT_TOKEN),
            session_body("dev-1"),
        ))
        .await
        .unwrap();

    let response = gw
        .app
        .clone()
        .oneshot(bare_request("DELETE", "/devices/dev-1", Some(STUDENT_TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The same device a second time is gone.
    let response = gw
        .app
        .oneshot(bare_request("DELETE", "/devices/dev-1", Some(STUDENT_TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoking_an_unknown_device_is_not_found() {
    let gw = gateway().await;

    let response = gw
        .app
        .oneshot(bare_request(
            "DELETE",
            "/devices/never-registered",
            Some(STUDENT_TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
