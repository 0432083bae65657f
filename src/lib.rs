pub mod backend;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod platform;
pub mod sensor;
pub mod server;
pub mod sink;
pub mod snapshot;

/// Integration domain, used to namespace object ids and device identifiers.
pub const DOMAIN: &str = "rwfc";
