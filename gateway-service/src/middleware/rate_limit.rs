use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::services::{metrics, Principal, Tier};
use crate::AppState;

/// Client network address as the limiter sees it: the first `x-forwarded-for`
/// hop when present (the gateway sits behind a proxy in production),
/// otherwise the socket peer address.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<std::net::IpAddr>().ok());

    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Extractor handing handlers the same client address the limiter
/// middleware uses, so composite keys agree across gates.
pub struct ClientIp(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(
            client_ip(&parts.headers, &parts.extensions)
                .unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}

pub(crate) fn too_many_requests(tier: Tier, retry_after: std::time::Duration) -> AppError {
    let retry_after_seconds = retry_after.as_secs().max(1);
    tracing::info!(
        tier = tier.as_str(),
        retry_after_seconds,
        "Rate limit exceeded"
    );
    metrics::gate_rejection("rate_limit");
    AppError::TooManyRequests(
        "Too many requests. Please try again later.".to_string(),
        Some(retry_after_seconds),
    )
}

/// General tier: applies to all API traffic, keyed by client IP. This is the
/// first gate of the pipeline; nothing downstream runs once it denies.
pub async fn general_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Requests with no derivable address share the "unknown" bucket, the
    // same key the `ClientIp` extractor hands to handlers.
    let ip = client_ip(request.headers(), request.extensions())
        .unwrap_or_else(|| "unknown".to_string());

    match state.limiter.check(Tier::General, &ip) {
        Ok(()) => Ok(next.run(request).await),
        Err(retry_after) => Err(too_many_requests(Tier::General, retry_after)),
    }
}

/// Upload tier: keyed by IP + account id, so it runs inside the auth
/// middleware where the verified principal is already attached.
pub async fn upload_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account_id = request
        .extensions()
        .get::<Principal>()
        .map(|p| p.account_id.clone())
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Upload rate limiting requires an authenticated principal"
            ))
        })?;

    let ip = client_ip(request.headers(), request.extensions())
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("{}:{}", ip, account_id);

    match state.limiter.check(Tier::Upload, &key) {
        Ok(()) => Ok(next.run(request).await),
        Err(retry_after) => Err(too_many_requests(Tier::Upload, retry_after)),
    }
}
