//! Prompt candidate model.
//!
//! Candidates are immutable once created: mutation and merge always produce
//! new candidates, never edit existing ones. Lineage forms a directed
//! acyclic graph (merge creates two in-edges) and a child's generation is
//! strictly greater than the maximum generation among its parents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strategy that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStrategy {
    /// Initial seed supplied by the caller.
    Seed,
    /// Single-parent reflective mutation.
    Mutation,
    /// Two-parent module-level merge.
    Merge,
}

/// Performance across the four tracked objective axes.
///
/// `accuracy` is the average verification quality over the full task
/// suite; the other three are cheap proxies measured during evaluation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceVector {
    pub accuracy: f64,
    /// Average wall-clock milliseconds per task evaluation.
    pub latency_ms: f64,
    /// Estimated token cost of the prompt itself.
    pub cost: f64,
    /// `1.0 - success_rate`: how often the candidate fails outright.
    pub risk: f64,
}

/// Outcome of evaluating a candidate on one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvaluation {
    pub success: bool,
    pub score: f64,
    pub feedback: String,
}

/// Provenance metadata for a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMetadata {
    pub created_at: DateTime<Utc>,
    pub strategy: CandidateStrategy,
    /// Ids of the candidates this one was derived from (mirrors `parent_ids`).
    pub source_ids: Vec<Uuid>,
}

/// A prompt variant in the evolutionary pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptCandidate {
    pub id: Uuid,
    pub text: String,
    pub parent_ids: Vec<Uuid>,
    pub generation: u32,
    pub performance: PerformanceVector,
    /// Task id -> evaluation outcome, one entry per task in the fixed suite.
    pub evaluation_results: HashMap<String, TaskEvaluation>,
    pub metadata: CandidateMetadata,
}

impl PromptCandidate {
    /// Create a generation-zero seed candidate.
    pub fn seed(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            parent_ids: Vec::new(),
            generation: 0,
            performance: PerformanceVector::default(),
            evaluation_results: HashMap::new(),
            metadata: CandidateMetadata {
                created_at: Utc::now(),
                strategy: CandidateStrategy::Seed,
                source_ids: Vec::new(),
            },
        }
    }

    /// Create a child candidate derived from one or two parents.
    ///
    /// The child's generation is `max(parent generations) + 1`, preserving
    /// the lineage ordering invariant.
    pub fn derived(
        text: impl Into<String>,
        parents: &[&PromptCandidate],
        strategy: CandidateStrategy,
    ) -> Self {
        let parent_ids: Vec<Uuid> = parents.iter().map(|p| p.id).collect();
        let generation = parents.iter().map(|p| p.generation).max().unwrap_or(0) + 1;

        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            parent_ids: parent_ids.clone(),
            generation,
            performance: PerformanceVector::default(),
            evaluation_results: HashMap::new(),
            metadata: CandidateMetadata {
                created_at: Utc::now(),
                strategy,
                source_ids: parent_ids,
            },
        }
    }

    /// Average evaluation score over all recorded tasks.
    pub fn average_score(&self) -> f64 {
        if self.evaluation_results.is_empty() {
            return 0.0;
        }
        let total: f64 = self.evaluation_results.values().map(|e| e.score).sum();
        total / self.evaluation_results.len() as f64
    }

    /// Fraction of recorded tasks that passed.
    pub fn success_rate(&self) -> f64 {
        if self.evaluation_results.is_empty() {
            return 0.0;
        }
        let passed = self.evaluation_results.values().filter(|e| e.success).count();
        passed as f64 / self.evaluation_results.len() as f64
    }
}
