//! Verification verdict model.
//!
//! A [`VerificationResult`] is produced fresh by the [`Verifier`] port on
//! every call and is immutable once returned. The threshold and quality
//! helpers are pure functions over the verdict so that every loop in the
//! crate scores attempts the same way.
//!
//! [`Verifier`]: crate::domain::ports::Verifier

use serde::{Deserialize, Serialize};

/// Structured verdict for a candidate answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether the answer is acceptable as-is.
    pub is_valid: bool,
    /// Verifier confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Concrete problems found in the answer.
    pub errors: Vec<String>,
    /// Actionable improvement suggestions for the next attempt.
    pub suggestions: Vec<String>,
}

impl VerificationResult {
    pub fn new(is_valid: bool, confidence: f64) -> Self {
        Self {
            is_valid,
            confidence: confidence.clamp(0.0, 1.0),
            errors: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Whether this verdict clears the configured confidence threshold.
    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }

    /// Scalar quality combining validity and confidence, in `[0.0, 1.0]`.
    ///
    /// Used to pick the best attempt when a loop exhausts its budget
    /// without producing a verified answer.
    pub fn quality_score(&self) -> f64 {
        let validity = if self.is_valid { 1.0 } else { 0.0 };
        0.5 * validity + 0.5 * self.confidence
    }
}
