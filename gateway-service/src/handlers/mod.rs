pub mod contact;
pub mod devices;
pub mod metrics;
pub mod session;
