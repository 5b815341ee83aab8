//! Domain models for the prompt optimization engine.

pub mod candidate;
pub mod config;
pub mod pool;
pub mod redo;
pub mod verification;

pub use candidate::{
    CandidateMetadata, CandidateStrategy, PerformanceVector, PromptCandidate, TaskEvaluation,
};
pub use config::{
    ActConfig, Config, EvaluationTask, EvolutionConfig, LoggingConfig, MultiScaleConfig,
    RedoConfig,
};
pub use pool::CandidatePool;
pub use redo::{MultiStepResult, RedoIteration, RedoResult};
pub use verification::VerificationResult;
