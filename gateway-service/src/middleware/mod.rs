pub mod auth;
pub mod metrics;
pub mod rate_limit;

pub use auth::{auth_middleware, AuthPrincipal};
pub use metrics::metrics_middleware;
pub use rate_limit::{
    general_rate_limit_middleware, upload_rate_limit_middleware, ClientIp,
};
