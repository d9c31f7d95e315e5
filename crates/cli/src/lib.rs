//! rwmod-monitor library surface
//!
//! Exposed so the integration tests can drive the monitor without a real
//! S3 endpoint.

pub mod daemon;
pub mod shutdown;
pub mod system_config;

pub use daemon::{Monitor, MonitorOptions};
pub use system_config::{ConfigError, SystemConfig};
