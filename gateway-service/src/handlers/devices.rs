use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::devices::{DeviceCountResponse, LogoutOthersRequest, LogoutOthersResponse},
    dtos::ErrorResponse,
    middleware::AuthPrincipal,
    services::GatewayError,
    utils::ValidatedJson,
    AppState,
};

/// List the caller's active devices
#[utoipa::path(
    get,
    path = "/devices",
    responses(
        (status = 200, description = "Current device set", body = DeviceCountResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Devices",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_devices(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> Result<impl IntoResponse, AppError> {
    let email = &principal.0.email;
    let (device_count, has_multiple_devices) = state.devices.count(email);

    Ok((
        StatusCode::OK,
        Json(DeviceCountResponse {
            device_count,
            has_multiple_devices,
            devices: state.devices.list(email),
        }),
    ))
}

/// Log out every device except the caller's current one
#[utoipa::path(
    post,
    path = "/devices/logout-others",
    request_body = LogoutOthersRequest,
    responses(
        (status = 200, description = "Other devices logged out", body = LogoutOthersResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Devices",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout_other_devices(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    ValidatedJson(req): ValidatedJson<LogoutOthersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = &principal.0.email;
    let removed = state.devices.logout_others(email, &req.current_device_id);

    tracing::info!(
        account_id = %principal.0.account_id,
        removed_devices = ?removed,
        current_device = %req.current_device_id,
        "Logged out other devices"
    );

    Ok((
        StatusCode::OK,
        Json(LogoutOthersResponse {
            logged_out_devices: removed.len(),
            current_device: req.current_device_id,
        }),
    ))
}

/// Revoke a single device's session
#[utoipa::path(
    delete,
    path = "/devices/{device_id}",
    params(
        ("device_id" = String, Path, description = "Device identifier to revoke")
    ),
    responses(
        (status = 200, description = "Device logged out"),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 404, description = "Device was not registered", body = ErrorResponse)
    ),
    tag = "Devices",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn revoke_device(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let email = &principal.0.email;

    if !state.devices.revoke(email, &device_id) {
        return Err(GatewayError::DeviceNotFound.into());
    }

    tracing::info!(
        account_id = %principal.0.account_id,
        device_id = %device_id,
        "Device session revoked"
    );

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Device logged out"
        })),
    ))
}
