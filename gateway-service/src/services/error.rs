use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Account suffix '{0}' is not authorized for this organization")]
    PolicyRejected(String),

    #[error("Missing bearer token")]
    TokenMissing,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Device not found")]
    DeviceNotFound,

    #[error("Identity provider unavailable")]
    UpstreamUnavailable(#[source] anyhow::Error),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            // Names the rejected token for operators; never the allow-list.
            GatewayError::PolicyRejected(token) => AppError::Forbidden(anyhow::anyhow!(
                "Account suffix '{}' is not authorized for this organization",
                token
            )),
            // The three token failures are deliberately indistinguishable to
            // the client; an unreachable provider fails closed into the same
            // message. The specific kind is logged where it occurs.
            GatewayError::TokenMissing
            | GatewayError::TokenInvalid
            | GatewayError::TokenExpired
            | GatewayError::UpstreamUnavailable(_) => {
                AppError::AuthError(anyhow::anyhow!("Invalid or expired token"))
            }
            GatewayError::DeviceNotFound => {
                AppError::NotFound(anyhow::anyhow!("Device not found"))
            }
        }
    }
}

/// Log a token-verification failure with its specific kind. Client responses
/// stay generic; the distinction only exists for operability.
pub fn log_token_failure(err: &GatewayError) {
    match err {
        GatewayError::UpstreamUnavailable(source) => {
            tracing::error!(error = %source, "Identity provider unreachable; failing closed");
        }
        GatewayError::TokenExpired => tracing::warn!("Rejected expired token"),
        GatewayError::TokenMissing => tracing::warn!("Request without bearer token"),
        _ => tracing::warn!("Rejected invalid token"),
    }
}
