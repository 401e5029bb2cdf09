use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};
use service_core::error::AppError;

use crate::services::error::log_token_failure;
use crate::services::{metrics, GatewayError, Principal};
use crate::AppState;

/// Middleware guarding protected endpoints: extracts the bearer token,
/// verifies it with the identity provider, and attaches the resulting
/// `Principal` to the request. No downstream code runs on failure.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let result = match token {
        Some(token) => state.identity.verify(token).await,
        None => Err(GatewayError::TokenMissing),
    };

    let principal = match result {
        Ok(principal) => principal,
        Err(err) => {
            log_token_failure(&err);
            metrics::gate_rejection("token");
            return Err(err.into());
        }
    };

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Extractor to easily get the verified principal in handlers.
pub struct AuthPrincipal(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Principal missing from request extensions; is the route behind auth_middleware?"
            ))
        })?;

        Ok(AuthPrincipal(principal.clone()))
    }
}
