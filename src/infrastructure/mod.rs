//! Infrastructure layer: adapters around the domain ports.
//!
//! - Configuration management (figment)
//! - Logging (tracing)
//!
//! Generator and Verifier implementations live with the caller; this
//! crate ships only the engine and its ambient plumbing.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigLoader};
