//! # swcache Common
//!
//! Shared plumbing for the swcache crates.
//!
//! ## Features
//!
//! - Logging configuration and subscriber setup (pretty, compact, JSON)
//! - Environment-driven log configuration for binaries

pub mod logging;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};

/// Environment variable holding the log filter (e.g. `swcache_sw=debug`).
pub const LOG_ENV: &str = "SWCACHE_LOG";

/// Environment variable selecting the log format (`pretty`, `compact`, `json`).
pub const LOG_FORMAT_ENV: &str = "SWCACHE_LOG_FORMAT";
