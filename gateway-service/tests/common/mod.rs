//! Shared setup for gateway integration tests: an in-memory state with a
//! mock identity provider and generous default rate limits, plus request
//! helpers.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use gateway_service::{
    build_router,
    config::{
        Environment, GatewayConfig, IdentityConfig, PolicyConfig, RateLimitConfig, SecurityConfig,
        SwaggerConfig, SwaggerMode,
    },
    policy::PolicyGate,
    services::{DeviceRegistry, FixedWindowLimiter, MockContactSink, MockIdentityProvider},
    AppState,
};
use http_body_util::BodyExt;
use std::sync::Arc;

pub const TEST_IP: &str = "203.0.113.7";
pub const STUDENT_EMAIL: &str = "23abcd@stu.example.edu";
pub const STUDENT_TOKEN: &str = "token-student";

pub fn generous_limits() -> RateLimitConfig {
    RateLimitConfig {
        general_max_requests: 10_000,
        general_window_seconds: 60,
        auth_max_requests: 10_000,
        auth_window_seconds: 900,
        contact_max_requests: 10_000,
        contact_window_seconds: 3600,
        upload_max_requests: 10_000,
        upload_window_seconds: 600,
    }
}

pub fn test_config(rate_limit: RateLimitConfig) -> GatewayConfig {
    GatewayConfig {
        common: service_core::config::Config {
            port: 8080,
            bind_address: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        },
        environment: Environment::Prod,
        service_name: "gateway-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        policy: PolicyConfig {
            domain_suffix: "@stu.example.edu".to_string(),
            allowed_accounts: ["ABCD".to_string(), "WXYZ".to_string()].into_iter().collect(),
        },
        identity: IdentityConfig {
            issuer: "https://idp.test".to_string(),
            audience: "learning-platform".to_string(),
            jwks_url: "https://idp.test/.well-known/jwks.json".to_string(),
            verify_timeout_seconds: 5,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit,
    }
}

pub struct TestGateway {
    pub app: Router,
    pub state: AppState,
    pub identity: Arc<MockIdentityProvider>,
    pub contact: Arc<MockContactSink>,
}

pub async fn gateway() -> TestGateway {
    gateway_with_limits(generous_limits()).await
}

pub async fn gateway_with_limits(rate_limit: RateLimitConfig) -> TestGateway {
    let config = test_config(rate_limit);

    let identity = Arc::new(MockIdentityProvider::new());
    identity.grant_account(STUDENT_TOKEN, "acct-student", STUDENT_EMAIL);

    let contact = Arc::new(MockContactSink::new());

    let state = AppState {
        policy: PolicyGate::new(&config.policy),
        identity: identity.clone(),
        limiter: Arc::new(FixedWindowLimiter::new(&config.rate_limit)),
        devices: Arc::new(DeviceRegistry::new()),
        contact: contact.clone(),
        config,
    };

    let app = build_router(state.clone())
        .await
        .expect("Failed to build router");

    TestGateway {
        app,
        state,
        identity,
        contact,
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", TEST_IP);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", TEST_IP);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}
