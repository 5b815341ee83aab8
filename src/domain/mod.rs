//! Domain layer: pure data models, capability ports, and error types.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{EngineError, EngineResult};
