//! Services layer for the access gateway: the device registry, the tiered
//! rate limiter, identity verification, and their error taxonomy.

pub mod contact;
pub mod devices;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod rate_limit;

pub use contact::{ContactSink, LoggingContactSink, MockContactSink};
pub use devices::DeviceRegistry;
pub use error::GatewayError;
pub use identity::{IdentityProvider, JwksIdentityProvider, MockIdentityProvider, Principal};
pub use rate_limit::{FixedWindowLimiter, Tier, TierLimit};
