//! Promptly - Prompt Optimization and Self-Correction Engine
//!
//! Promptly evolves prompt candidates against a fixed evaluation suite
//! and self-corrects individual answers at execution time:
//!
//! - **Evolutionary pool** (`services::EvolutionEngine`): reflective
//!   mutation and module-level merge over a Pareto-frontier pool, with
//!   minibatch gating and strict budget accounting.
//! - **Verify-regenerate loop** (`services::RedoLoop`): generate, verify,
//!   and regenerate with targeted correction prompts until an answer
//!   clears the confidence threshold.
//! - **Adaptive halting** (`services::AdaptiveRedoLoop`): a learned
//!   halt/continue layer on top of the redo loop, with EMA-smoothed
//!   signals and an optional multi-scale reasoning-state echo.
//!
//! # Architecture
//!
//! The crate follows Clean Architecture / Hexagonal Architecture
//! principles:
//!
//! - **Domain Layer** (`domain`): pure models, ports, and error types
//! - **Service Layer** (`services`): the three engines
//! - **Infrastructure Layer** (`infrastructure`): config and logging
//!
//! LLM access is injected through the `Generator` and `Verifier` ports;
//! the crate never talks to a model provider directly.
//!
//! # Example
//!
//! ```ignore
//! use promptly::{EvolutionConfig, EvolutionEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Construct an engine with your Generator/Verifier adapters
//!     // and call evolve() with seed prompts.
//!     Ok(())
//! }
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::error::{EngineError, EngineResult};
pub use domain::models::{
    ActConfig, CandidatePool, CandidateStrategy, Config, EvaluationTask, EvolutionConfig,
    LoggingConfig, MultiScaleConfig, MultiStepResult, PerformanceVector, PromptCandidate,
    RedoConfig, RedoIteration, RedoResult, TaskEvaluation, VerificationResult,
};
pub use domain::ports::{Generator, Verifier};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AdaptiveRedoLoop, AdaptiveRedoResult, EvolutionEngine, EvolutionSummary, GenerationRecord,
    RedoLoop,
};
