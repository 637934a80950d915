//! Engine configuration: RON-backed settings with sensible defaults.
//!
//! Covers the tunables of the visibility and navmesh subsystems (hysteresis
//! thresholds, coherent-query tolerances, grid cell size) plus debug
//! settings such as the log level.

mod config;
mod error;

pub use config::{Config, DebugConfig, HysteresisConfig, QueryConfig};
pub use error::ConfigError;
