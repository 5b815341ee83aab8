//! Configuration surface for the engines.
//!
//! All configuration is pure data with serde derives and programmatic
//! defaults; hierarchical loading and validation live in
//! `infrastructure::config`. No hidden globals: every engine instance is
//! constructed with an explicit config per logical run.

use serde::{Deserialize, Serialize};

/// One task in the fixed evaluation suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTask {
    pub id: String,
    /// The task input handed to candidates and to the verifier.
    pub input: String,
    /// Optional ground truth forwarded to the verifier.
    pub expected: Option<serde_json::Value>,
}

impl EvaluationTask {
    pub fn new(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            expected: None,
        }
    }

    pub fn with_expected(mut self, expected: serde_json::Value) -> Self {
        self.expected = Some(expected);
        self
    }
}

/// Configuration for the evolutionary candidate pool engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Total evaluation units available to the run.
    pub budget: i64,
    /// Tasks sampled per proposal; also the per-generation budget cost.
    pub minibatch_size: usize,
    /// Probability of choosing mutation over merge each generation.
    pub mutation_probability: f64,
    /// Probability of choosing merge. Must sum to 1.0 with mutation.
    pub merge_probability: f64,
    /// Relative margin a proposal must beat its parent by (default 5%).
    pub performance_threshold: f64,
    /// Smaller relative margin against the frontier average (default 2%).
    pub frontier_threshold: f64,
    /// Stop early once the best full-suite average reaches this score.
    pub convergence_threshold: Option<f64>,
    /// The fixed evaluation suite.
    pub tasks: Vec<EvaluationTask>,
    /// RNG seed for deterministic runs; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            budget: 50,
            minibatch_size: 5,
            mutation_probability: 0.7,
            merge_probability: 0.3,
            performance_threshold: 0.05,
            frontier_threshold: 0.02,
            convergence_threshold: None,
            tasks: Vec::new(),
            rng_seed: None,
        }
    }
}

/// Configuration for the verify-regenerate loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedoConfig {
    pub max_iterations: u32,
    /// Confidence at or above which an attempt is terminal-verified.
    pub confidence_threshold: f64,
    /// Model identifier recorded on every attempt.
    pub model: String,
    /// Verifier flavor recorded for audit; the port impl interprets it.
    pub verifier_type: String,
    /// Whether the adaptive layer updates its Q-values on terminals.
    pub enable_learning: bool,
    /// Wall-clock budget checked at iteration boundaries.
    pub timeout_ms: u64,
}

impl Default for RedoConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            confidence_threshold: 0.8,
            model: "default".to_string(),
            verifier_type: "general".to_string(),
            enable_learning: true,
            timeout_ms: 120_000,
        }
    }
}

/// Configuration for the adaptive halting (ACT) layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActConfig {
    pub enable_act: bool,
    /// Halt when `sigmoid(halt_q)` exceeds this.
    pub halt_threshold: f64,
    /// Floor for the continue side of the decision.
    pub continue_threshold: f64,
    /// Step size for the bandit-style Q update.
    pub learning_rate: f64,
    /// EMA decay for the smoothed confidence/quality signal.
    ///
    /// The default of 0.999 moves slowly: in short (<=5 iteration) runs
    /// the EMA stays near its 0.5 seed unless tuned down.
    pub ema_decay: f64,
}

impl Default for ActConfig {
    fn default() -> Self {
        Self {
            enable_act: true,
            halt_threshold: 0.7,
            continue_threshold: 0.3,
            learning_rate: 0.1,
            ema_decay: 0.999,
        }
    }
}

/// Configuration for the multi-scale reasoning-state vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiScaleConfig {
    pub enable_multiscale: bool,
    /// Length of the reasoning-state vector.
    pub latent_dim: usize,
    /// Nominal depth of the reasoning stack (recorded, not structural).
    pub reasoning_layers: u32,
    /// Per-scale nudge factors; dimension `i` uses factor `i % len`.
    pub scale_factors: Vec<f64>,
}

impl Default for MultiScaleConfig {
    fn default() -> Self {
        Self {
            enable_multiscale: false,
            latent_dim: 8,
            reasoning_layers: 2,
            scale_factors: vec![1.0, 0.5, 0.25],
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Output format (json, pretty).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Top-level configuration bundle for hierarchical loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub evolution: EvolutionConfig,
    pub redo: RedoConfig,
    pub act: ActConfig,
    pub multiscale: MultiScaleConfig,
    pub logging: LoggingConfig,
}
