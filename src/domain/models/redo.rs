//! Attempt records for the verify-regenerate loop.
//!
//! Every generate/verify pair produces a [`RedoIteration`]; a loop run
//! produces exactly one [`RedoResult`]. Both are immutable once built, and
//! the attempt log is append-only and totally ordered by iteration index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::verification::VerificationResult;

/// One generate/verify attempt inside a loop run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedoIteration {
    pub iteration: u32,
    pub answer: String,
    pub verification: VerificationResult,
    pub timestamp: DateTime<Utc>,
    /// The exact prompt sent to the generator for this attempt.
    pub prompt_used: String,
    pub model: String,
}

impl RedoIteration {
    /// Quality of this attempt per the shared scoring rule.
    pub fn quality(&self) -> f64 {
        self.verification.quality_score()
    }
}

/// Final outcome of one verify-regenerate run.
///
/// An exhausted run is not an error: `verified` is false and
/// `final_answer` carries the best attempt seen. Callers must check
/// `verified` explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedoResult {
    pub final_answer: String,
    pub verified: bool,
    /// Number of generate/verify cycles executed.
    pub iterations: u32,
    pub all_attempts: Vec<RedoIteration>,
    pub elapsed_ms: u64,
    /// Confidence of the returned attempt.
    pub confidence: f64,
    /// Quality of the returned attempt.
    pub quality_score: f64,
    /// Final quality minus first-attempt quality. Zero by definition when
    /// fewer than two attempts exist.
    pub improvement_over_initial: f64,
}

impl RedoResult {
    /// Assemble a result from an attempt log, selecting the returned
    /// answer.
    ///
    /// When `verified_index` is set, that attempt is the verified answer.
    /// Otherwise the best-quality attempt wins, which is not necessarily
    /// the last one.
    pub fn from_attempts(
        attempts: Vec<RedoIteration>,
        verified_index: Option<usize>,
        elapsed_ms: u64,
    ) -> Self {
        let chosen = match verified_index {
            Some(i) => attempts.get(i),
            None => attempts.iter().max_by(|a, b| {
                a.quality()
                    .partial_cmp(&b.quality())
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        };

        let (final_answer, confidence, quality_score) = match chosen {
            Some(attempt) => (
                attempt.answer.clone(),
                attempt.verification.confidence,
                attempt.quality(),
            ),
            None => (String::new(), 0.0, 0.0),
        };

        let improvement_over_initial = if attempts.len() >= 2 {
            quality_score - attempts[0].quality()
        } else {
            0.0
        };

        Self {
            final_answer,
            verified: verified_index.is_some(),
            iterations: attempts.len() as u32,
            all_attempts: attempts,
            elapsed_ms,
            confidence,
            quality_score,
            improvement_over_initial,
        }
    }
}

/// Outcome of a chained multi-step run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiStepResult {
    /// One result per sub-task, in execution order.
    pub step_results: Vec<RedoResult>,
    pub all_verified: bool,
    /// Heuristic flag: a later step failed while an earlier step was
    /// unverified. This is a correlation signal, not a proven causal
    /// link between the failures.
    pub error_propagation: bool,
    pub elapsed_ms: u64,
}
