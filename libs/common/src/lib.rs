//! Common library for the storefront services
//!
//! This crate provides shared functionality used across the storefront's
//! services: the session monitor configuration and the error taxonomy used
//! by the session guard and its identity collaborators.
//!
//! ```rust
//! use common::config::MonitorConfig;
//!
//! let config = MonitorConfig::from_minutes(30, 5, 30).expect("valid configuration");
//! assert_eq!(config.warning_threshold().as_secs(), 25 * 60);
//! ```

pub mod config;
pub mod error;

pub use config::MonitorConfig;
pub use error::{ConfigError, IdentityError, IdentityResult, SessionError, SessionResult};
