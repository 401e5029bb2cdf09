pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod policy;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::SecurityScheme,
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, GatewayConfig, SwaggerMode};
use crate::policy::PolicyGate;
use crate::services::{ContactSink, DeviceRegistry, FixedWindowLimiter, IdentityProvider};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::session::establish_session,
        handlers::devices::list_devices,
        handlers::devices::logout_other_devices,
        handlers::devices::revoke_device,
        handlers::contact::submit_contact,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::session::SessionRequest,
            dtos::session::SessionResponse,
            dtos::devices::DeviceCountResponse,
            dtos::devices::LogoutOthersRequest,
            dtos::devices::LogoutOthersResponse,
            dtos::contact::ContactRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Session", description = "Session establishment and device registration"),
        (name = "Devices", description = "Per-account device session management"),
        (name = "Contact", description = "Throttled contact-form intake"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub policy: PolicyGate,
    pub identity: Arc<dyn IdentityProvider>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub devices: Arc<DeviceRegistry>,
    pub contact: Arc<dyn ContactSink>,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Device endpoints sit behind token verification; the registry is never
    // touched when verification fails.
    let device_routes = Router::new()
        .route("/devices", get(handlers::devices::list_devices))
        .route(
            "/devices/logout-others",
            post(handlers::devices::logout_other_devices),
        )
        .route("/devices/:device_id", delete(handlers::devices::revoke_device))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        // Keep the OpenAPI JSON available for programmatic access.
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .route("/auth/session", post(handlers::session::establish_session))
        .route("/contact", post(handlers::contact::submit_contact))
        .merge(device_routes)
        .with_state(state.clone())
        // The general limiter gates every route ahead of any per-route
        // middleware; the observability wrappers sit outside it so even
        // rejected requests get a request id, a span, and a metrics sample.
        .layer(from_fn_with_state(
            state.clone(),
            middleware::general_rate_limit_middleware,
        ))
        .layer(from_fn(middleware::metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(service_core::middleware::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|origin| match origin.parse::<HeaderValue>() {
                            Ok(value) => Some(value),
                            Err(e) => {
                                tracing::error!(origin = %origin, error = %e, "Skipping invalid CORS origin");
                                None
                            }
                        })
                        .collect::<Vec<HeaderValue>>(),
                )
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Wrap downstream upload routes with the protected-endpoint gates: token
/// verification first, then the upload tier keyed by IP + account id. The
/// upload handlers themselves live in other services.
pub fn guard_upload_routes(state: &AppState, routes: Router<AppState>) -> Router<AppState> {
    routes
        .layer(from_fn_with_state(
            state.clone(),
            middleware::upload_rate_limit_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware))
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
    }))
}
