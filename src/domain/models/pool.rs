//! Candidate pool, scores matrix, and Pareto frontier.
//!
//! The pool is owned by exactly one optimization run. Admitted candidates
//! are retained for the lifetime of the run; there is no eviction policy
//! in this design.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::PromptCandidate;

/// The set of admitted candidates plus the bookkeeping the evolution
/// engine needs for selection and budget accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePool {
    /// All admitted candidates, append-only.
    pub candidates: Vec<PromptCandidate>,
    /// Candidate id -> task id -> pass bit, used for dominance comparison.
    pub scores_matrix: HashMap<Uuid, HashMap<String, bool>>,
    /// Ids of the current non-dominated candidates.
    pub pareto_frontier: Vec<Uuid>,
    /// Remaining evaluation units. Strictly decreasing; the run stops the
    /// instant it reaches zero or below.
    pub evolution_budget: i64,
    pub current_generation: u32,
}

impl CandidatePool {
    pub fn new(budget: i64) -> Self {
        Self {
            candidates: Vec::new(),
            scores_matrix: HashMap::new(),
            pareto_frontier: Vec::new(),
            evolution_budget: budget,
            current_generation: 0,
        }
    }

    /// Admit a fully evaluated candidate and refresh the frontier.
    pub fn admit(&mut self, candidate: PromptCandidate) {
        let passes: HashMap<String, bool> = candidate
            .evaluation_results
            .iter()
            .map(|(task_id, eval)| (task_id.clone(), eval.success))
            .collect();
        self.scores_matrix.insert(candidate.id, passes);
        self.candidates.push(candidate);
        self.recompute_frontier();
    }

    pub fn get(&self, id: Uuid) -> Option<&PromptCandidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// Candidates currently on the Pareto frontier.
    pub fn frontier_candidates(&self) -> Vec<&PromptCandidate> {
        self.pareto_frontier
            .iter()
            .filter_map(|id| self.get(*id))
            .collect()
    }

    /// Mean of (average score, success rate) across the frontier.
    pub fn frontier_averages(&self) -> (f64, f64) {
        let frontier = self.frontier_candidates();
        if frontier.is_empty() {
            return (0.0, 0.0);
        }
        let n = frontier.len() as f64;
        let avg: f64 = frontier.iter().map(|c| c.average_score()).sum::<f64>() / n;
        let sr: f64 = frontier.iter().map(|c| c.success_rate()).sum::<f64>() / n;
        (avg, sr)
    }

    /// Whether `a` dominates `b`: at least as good on both average score
    /// and success rate, strictly better on at least one.
    pub fn dominates(a: &PromptCandidate, b: &PromptCandidate) -> bool {
        let (a_avg, a_sr) = (a.average_score(), a.success_rate());
        let (b_avg, b_sr) = (b.average_score(), b.success_rate());
        a_avg >= b_avg && a_sr >= b_sr && (a_avg > b_avg || a_sr > b_sr)
    }

    /// Recompute the frontier by pairwise comparison over the whole pool.
    ///
    /// O(n^2), acceptable because admissions are throttled by the
    /// minibatch gate upstream.
    pub fn recompute_frontier(&mut self) {
        self.pareto_frontier = self
            .candidates
            .iter()
            .filter(|c| {
                !self
                    .candidates
                    .iter()
                    .any(|other| other.id != c.id && Self::dominates(other, c))
            })
            .map(|c| c.id)
            .collect();
    }

    /// Deduct one generation's evaluation cost from the budget.
    pub fn consume_budget(&mut self, units: i64) {
        self.evolution_budget -= units;
    }

    pub fn has_budget(&self) -> bool {
        self.evolution_budget > 0
    }
}
