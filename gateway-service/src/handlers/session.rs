use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::session::{SessionRequest, SessionResponse},
    dtos::ErrorResponse,
    middleware::rate_limit::too_many_requests,
    middleware::ClientIp,
    policy::PolicyGate,
    services::error::log_token_failure,
    services::{metrics, GatewayError, Tier},
    utils::ValidatedJson,
    AppState,
};

/// Establish a device session: the credential-issuing path of the
/// gateway pipeline.
///
/// The auth-tier rate limit, the organizational policy, and token
/// verification run in that order; each failure short-circuits before the
/// device registry is touched. A successful sign-in is forgiven by the auth limiter so
/// legitimate repeat logins are never throttled.
#[utoipa::path(
    post,
    path = "/auth/session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session established, device registered", body = SessionResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Account not authorized for this organization", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = ErrorResponse)
    ),
    tag = "Session",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn establish_session(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<SessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Failed attempts for the same IP + email share one bucket.
    let attempt_key = format!("{}:{}", ip, req.email.to_lowercase());
    if let Err(retry_after) = state.limiter.check(Tier::Auth, &attempt_key) {
        return Err(too_many_requests(Tier::Auth, retry_after));
    }

    if !state.policy.validate(&req.email) {
        let token = PolicyGate::account_token(&req.email);
        tracing::warn!(account_suffix = %token, "Rejected sign-in from unauthorized account");
        metrics::gate_rejection("policy");
        return Err(GatewayError::PolicyRejected(token).into());
    }

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let verification = match bearer {
        Some(token) => state.identity.verify(token).await,
        None => Err(GatewayError::TokenMissing),
    };

    let principal = match verification {
        Ok(principal) => principal,
        Err(err) => {
            log_token_failure(&err);
            metrics::gate_rejection("token");
            return Err(err.into());
        }
    };

    // The policy gate ran against the claimed email; the session must bind
    // to the same, now verified, account.
    if !principal.email.eq_ignore_ascii_case(&req.email) {
        tracing::warn!(
            claimed = %req.email,
            verified = %principal.email,
            "Session email does not match verified token"
        );
        metrics::gate_rejection("token");
        return Err(GatewayError::TokenInvalid.into());
    }

    state.devices.register(&principal.email, &req.device_id);
    let (device_count, has_multiple_devices) = state.devices.count(&principal.email);

    if has_multiple_devices {
        tracing::info!(
            account_id = %principal.account_id,
            device_count,
            "Account exceeds the single-device ceiling"
        );
    }

    // Only failed attempts count against the auth tier.
    state.limiter.forgive(Tier::Auth, &attempt_key);

    Ok((
        StatusCode::OK,
        Json(SessionResponse {
            device_count,
            has_multiple_devices,
        }),
    ))
}
