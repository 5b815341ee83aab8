//! Capability ports consumed by the engines.
//!
//! The core never talks to a model provider directly. Callers hand in a
//! [`Generator`] (any LLM call) and a [`Verifier`] (any evaluation of an
//! answer), both async and I/O-bound. Failures surface as rejected calls;
//! the loops do not re-invoke a failed call automatically — retry only
//! happens through the verify-correct cycle.
//!
//! Tests inject deterministic fakes; production callers must supply real
//! implementations. There is no random fallback evaluator in this crate.

use async_trait::async_trait;

use super::error::EngineResult;
use super::models::verification::VerificationResult;

/// Produces model output text for a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> EngineResult<String>;
}

/// Evaluates a candidate answer for a task and returns a structured
/// verdict.
///
/// Re-running verification on the same `(task, answer, context)` is
/// assumed deterministic by contract; the loops never re-verify an
/// already-recorded attempt.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(
        &self,
        task: &str,
        answer: &str,
        context: Option<&str>,
        ground_truth: Option<&serde_json::Value>,
    ) -> EngineResult<VerificationResult>;
}
