//! Adaptive halting (ACT) layer over the verify-regenerate loop.
//!
//! Replaces the fixed threshold-only stop rule with a learned
//! halt/continue decision: two scalar Q-values updated by a bandit-style
//! rule on every terminal outcome, plus an EMA-stabilized
//! confidence/quality signal and an optional multi-scale reasoning-state
//! vector that is echoed into the regeneration prompt as literal text.
//!
//! The Q-values are single-state: they are not conditioned on task type
//! or difficulty, so learned halting behavior is global across all tasks
//! processed by one instance. That simplicity is a documented design
//! limitation, kept intentionally.
//!
//! The default EMA decay of 0.999 moves slowly. In the short (<=5)
//! iteration regimes typical here, the EMA stays close to its 0.5 seed
//! unless `ema_decay` is tuned down — intentional but nonobvious; callers
//! accounting for the EMA must know this.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::error::EngineResult;
use crate::domain::models::{ActConfig, MultiScaleConfig, RedoConfig, RedoIteration, RedoResult};
use crate::domain::ports::{Generator, Verifier};

use super::redo_loop::build_correction_prompt;

/// Reward granted on a verified terminal.
const REWARD_SUCCESS: f64 = 1.0;
/// Reward granted on any unverified terminal.
const REWARD_FAILURE: f64 = -0.5;
/// Initial EMA seed before any observation.
const EMA_SEED: f64 = 0.5;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Per-call ACT state. Reset on every `execute`; only the Q-values
/// persist on the loop instance itself.
#[derive(Debug, Clone)]
struct ActState {
    ema_score: f64,
    ema_quality: f64,
    reasoning_state: Vec<f64>,
}

impl ActState {
    fn new(latent_dim: usize) -> Self {
        Self {
            ema_score: EMA_SEED,
            ema_quality: EMA_SEED,
            reasoning_state: vec![0.0; latent_dim],
        }
    }

    /// Blend a raw observation into the EMA: `ema = d*ema + (1-d)*raw`.
    fn smooth(&mut self, decay: f64, raw_confidence: f64, raw_quality: f64) {
        self.ema_score = decay * self.ema_score + (1.0 - decay) * raw_confidence;
        self.ema_quality = decay * self.ema_quality + (1.0 - decay) * raw_quality;
    }

    /// Nudge each dimension by `scale * feedback * confidence`, clamped
    /// to [-1, 1]. Dimension `i` uses scale factor `i % factors.len()`.
    fn nudge(&mut self, factors: &[f64], feedback: f64, confidence: f64) {
        if factors.is_empty() {
            return;
        }
        for (i, value) in self.reasoning_state.iter_mut().enumerate() {
            let scale = factors[i % factors.len()];
            *value = (*value + scale * feedback * confidence).clamp(-1.0, 1.0);
        }
    }
}

/// Result of one adaptive run: the underlying redo result plus the ACT
/// signals observed at termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveRedoResult {
    pub result: RedoResult,
    /// EMA of raw confidence at termination.
    pub ema_score: f64,
    /// EMA of raw quality at termination.
    pub ema_quality: f64,
    /// `sigmoid(halt_q)` at termination.
    pub halt_probability: f64,
    /// Whether the learned halt decision ended the run early.
    pub halted_early: bool,
    /// Reasoning-state vector at termination (empty when multi-scale is
    /// disabled).
    pub reasoning_state: Vec<f64>,
}

/// Verify-regenerate loop with learned adaptive halting.
///
/// Methods take `&mut self`: the Q-values mutate in place, so one
/// instance must not be shared across concurrent runs without external
/// synchronization.
pub struct AdaptiveRedoLoop {
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    redo_config: RedoConfig,
    act: ActConfig,
    multiscale: MultiScaleConfig,
    halt_q: f64,
    continue_q: f64,
}

impl AdaptiveRedoLoop {
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
        redo_config: RedoConfig,
        act: ActConfig,
        multiscale: MultiScaleConfig,
    ) -> Self {
        Self {
            generator,
            verifier,
            redo_config,
            act,
            multiscale,
            halt_q: 0.0,
            continue_q: 0.0,
        }
    }

    /// Learned estimate of expected reward for halting.
    pub fn halt_q(&self) -> f64 {
        self.halt_q
    }

    /// Learned estimate of expected reward for continuing.
    pub fn continue_q(&self) -> f64 {
        self.continue_q
    }

    /// Run the loop for one task with adaptive halting.
    ///
    /// Per-call state (EMA, reasoning vector) resets here; the Q-values
    /// persist across calls on this instance — that persistence is the
    /// learning signal.
    pub async fn execute(
        &mut self,
        task: &str,
        context: Option<&str>,
        ground_truth: Option<&serde_json::Value>,
    ) -> EngineResult<AdaptiveRedoResult> {
        let start = Instant::now();
        let timeout = Duration::from_millis(self.redo_config.timeout_ms);
        let latent_dim = if self.multiscale.enable_multiscale {
            self.multiscale.latent_dim
        } else {
            0
        };
        let mut state = ActState::new(latent_dim);
        let mut attempts: Vec<RedoIteration> = Vec::new();
        let mut verified_index: Option<usize> = None;
        let mut halted_early = false;

        for iteration in 0..self.redo_config.max_iterations {
            if iteration > 0 && start.elapsed() >= timeout {
                tracing::warn!(iteration, "adaptive loop timed out");
                break;
            }

            let prompt = self.build_prompt(task, context, attempts.last(), &state);
            let answer = self.generator.generate(&prompt).await?;
            let verification = self
                .verifier
                .verify(task, &answer, context, ground_truth)
                .await?;

            let confidence = verification.confidence;
            let quality = verification.quality_score();
            state.smooth(self.act.ema_decay, confidence, quality);

            // Feedback signal in [-0.5, 0.5]: how far this attempt sits
            // from a coin-flip quality.
            let feedback = quality - 0.5;
            if self.multiscale.enable_multiscale {
                state.nudge(&self.multiscale.scale_factors, feedback, confidence);
            }

            tracing::debug!(
                iteration,
                confidence,
                ema_score = state.ema_score,
                halt_probability = sigmoid(self.halt_q),
                "adaptive iteration verified"
            );

            let verified_now =
                verification.meets_threshold(self.redo_config.confidence_threshold);
            attempts.push(RedoIteration {
                iteration,
                answer,
                verification,
                timestamp: Utc::now(),
                prompt_used: prompt,
                model: self.redo_config.model.clone(),
            });

            if verified_now {
                verified_index = Some(attempts.len() - 1);
                break;
            }

            // Learned halt decision: stop iterating when the halt
            // probability clears the threshold.
            if self.act.enable_act
                && sigmoid(self.halt_q) > self.act.halt_threshold
                && iteration + 1 < self.redo_config.max_iterations
            {
                tracing::info!(
                    iteration,
                    halt_probability = sigmoid(self.halt_q),
                    "adaptive loop halting early"
                );
                halted_early = true;
                break;
            }
        }

        let verified = verified_index.is_some();
        if self.redo_config.enable_learning {
            self.update_q(verified, halted_early);
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let result = RedoResult::from_attempts(attempts, verified_index, elapsed_ms);

        Ok(AdaptiveRedoResult {
            result,
            ema_score: state.ema_score,
            ema_quality: state.ema_quality,
            halt_probability: sigmoid(self.halt_q),
            halted_early,
            reasoning_state: state.reasoning_state,
        })
    }

    /// Bandit-style update on the terminal outcome: `Q += lr*(r - Q)`.
    ///
    /// The halted side of the decision gets the credit: `halt_q` when the
    /// terminal was an early halt, `continue_q` otherwise (verified
    /// success or exhaustion both reflect on the decision to keep going).
    fn update_q(&mut self, verified: bool, halted_early: bool) {
        let reward = if verified {
            REWARD_SUCCESS
        } else {
            REWARD_FAILURE
        };
        let lr = self.act.learning_rate;
        if halted_early {
            self.halt_q += lr * (reward - self.halt_q);
        } else {
            self.continue_q += lr * (reward - self.continue_q);
        }
    }

    /// Correction prompt plus, when multi-scale is enabled, the printed
    /// reasoning vector. The vector influences the next answer only
    /// through this textual repetition in-context, not through any
    /// structural mechanism.
    fn build_prompt(
        &self,
        task: &str,
        context: Option<&str>,
        previous: Option<&RedoIteration>,
        state: &ActState,
    ) -> String {
        let mut prompt = build_correction_prompt(task, context, previous);

        if self.multiscale.enable_multiscale && previous.is_some() {
            let rendered: Vec<String> = state
                .reasoning_state
                .iter()
                .map(|v| format!("{v:.3}"))
                .collect();
            prompt.push_str(&format!(
                "\n\nReasoning state: [{}]",
                rendered.join(", ")
            ));
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::VerificationResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingGenerator {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> EngineResult<String> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!("answer-{}", prompts.len() - 1))
        }
    }

    struct ConstantVerifier {
        verdict: VerificationResult,
    }

    #[async_trait]
    impl Verifier for ConstantVerifier {
        async fn verify(
            &self,
            _task: &str,
            _answer: &str,
            _context: Option<&str>,
            _ground_truth: Option<&serde_json::Value>,
        ) -> EngineResult<VerificationResult> {
            Ok(self.verdict.clone())
        }
    }

    fn adaptive(
        verdict: VerificationResult,
        redo: RedoConfig,
        act: ActConfig,
        multiscale: MultiScaleConfig,
    ) -> AdaptiveRedoLoop {
        AdaptiveRedoLoop::new(
            Arc::new(RecordingGenerator::new()),
            Arc::new(ConstantVerifier { verdict }),
            redo,
            act,
            multiscale,
        )
    }

    #[tokio::test]
    async fn test_slow_ema_stays_near_seed() {
        // Decay 0.999: three iterations of raw 0.9 move the EMA from
        // its 0.5 seed to roughly 0.5012.
        let mut loop_ = adaptive(
            VerificationResult::new(true, 0.9),
            RedoConfig {
                max_iterations: 3,
                confidence_threshold: 0.95, // keep 0.9 below the bar
                ..Default::default()
            },
            ActConfig::default(),
            MultiScaleConfig::default(),
        );

        let outcome = loop_.execute("summarize", None, None).await.unwrap();
        assert_eq!(outcome.result.iterations, 3);
        assert!(!outcome.result.verified);
        assert!(
            (outcome.ema_score - 0.5012).abs() < 1e-4,
            "ema_score = {}",
            outcome.ema_score
        );
    }

    #[tokio::test]
    async fn test_low_decay_tracks_observations() {
        let mut loop_ = adaptive(
            VerificationResult::new(true, 0.9),
            RedoConfig {
                max_iterations: 3,
                confidence_threshold: 0.95,
                ..Default::default()
            },
            ActConfig {
                ema_decay: 0.5,
                ..Default::default()
            },
            MultiScaleConfig::default(),
        );

        let outcome = loop_.execute("summarize", None, None).await.unwrap();
        // 0.5 -> 0.7 -> 0.8 -> 0.85
        assert!((outcome.ema_score - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_exhaustion_updates_continue_q() {
        let mut loop_ = adaptive(
            VerificationResult::new(false, 0.4),
            RedoConfig {
                max_iterations: 2,
                ..Default::default()
            },
            ActConfig::default(),
            MultiScaleConfig::default(),
        );

        let outcome = loop_.execute("summarize", None, None).await.unwrap();
        assert!(!outcome.result.verified);
        // Q <- 0 + 0.1 * (-0.5 - 0) = -0.05
        assert!((loop_.continue_q() - (-0.05)).abs() < 1e-9);
        assert_eq!(loop_.halt_q(), 0.0);
    }

    #[tokio::test]
    async fn test_verified_success_rewards_continue_q() {
        let mut loop_ = adaptive(
            VerificationResult::new(true, 0.95),
            RedoConfig::default(),
            ActConfig::default(),
            MultiScaleConfig::default(),
        );

        let outcome = loop_.execute("summarize", None, None).await.unwrap();
        assert!(outcome.result.verified);
        // Q <- 0 + 0.1 * (1.0 - 0) = 0.1
        assert!((loop_.continue_q() - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_early_halt_updates_halt_q() {
        // sigmoid(0) = 0.5 > 0.4 threshold: halts after the first
        // failing iteration.
        let mut loop_ = adaptive(
            VerificationResult::new(false, 0.4),
            RedoConfig {
                max_iterations: 5,
                ..Default::default()
            },
            ActConfig {
                halt_threshold: 0.4,
                ..Default::default()
            },
            MultiScaleConfig::default(),
        );

        let outcome = loop_.execute("summarize", None, None).await.unwrap();
        assert!(outcome.halted_early);
        assert_eq!(outcome.result.iterations, 1);
        assert!((loop_.halt_q() - (-0.05)).abs() < 1e-9);
        assert_eq!(loop_.continue_q(), 0.0);
    }

    #[tokio::test]
    async fn test_q_values_persist_across_calls() {
        let mut loop_ = adaptive(
            VerificationResult::new(false, 0.4),
            RedoConfig {
                max_iterations: 1,
                ..Default::default()
            },
            ActConfig::default(),
            MultiScaleConfig::default(),
        );

        loop_.execute("one", None, None).await.unwrap();
        loop_.execute("two", None, None).await.unwrap();
        // Two exhaustion terminals: -0.05, then -0.05 + 0.1*(-0.5+0.05).
        assert!((loop_.continue_q() - (-0.095)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_learning_disabled_freezes_q() {
        let mut loop_ = adaptive(
            VerificationResult::new(false, 0.4),
            RedoConfig {
                max_iterations: 1,
                enable_learning: false,
                ..Default::default()
            },
            ActConfig::default(),
            MultiScaleConfig::default(),
        );

        loop_.execute("one", None, None).await.unwrap();
        assert_eq!(loop_.continue_q(), 0.0);
        assert_eq!(loop_.halt_q(), 0.0);
    }

    #[tokio::test]
    async fn test_reasoning_state_clamped_and_printed() {
        let generator = Arc::new(RecordingGenerator::new());
        let mut loop_ = AdaptiveRedoLoop::new(
            generator.clone(),
            Arc::new(ConstantVerifier {
                verdict: VerificationResult::new(true, 0.9),
            }),
            RedoConfig {
                max_iterations: 4,
                confidence_threshold: 0.95,
                ..Default::default()
            },
            ActConfig::default(),
            MultiScaleConfig {
                enable_multiscale: true,
                latent_dim: 4,
                reasoning_layers: 2,
                // Oversized factor to force clamping within a few steps.
                scale_factors: vec![5.0],
            },
        );

        let outcome = loop_.execute("summarize", None, None).await.unwrap();
        assert_eq!(outcome.reasoning_state.len(), 4);
        for v in &outcome.reasoning_state {
            assert!(*v >= -1.0 && *v <= 1.0);
            // quality 0.95, feedback 0.45, confidence 0.9, scale 5.0:
            // one step already saturates the clamp.
            assert!((*v - 1.0).abs() < 1e-9);
        }

        // The vector is echoed into every regeneration prompt.
        let prompts = generator.prompts.lock().unwrap();
        assert!(!prompts[0].contains("Reasoning state"));
        assert!(prompts[1].contains("Reasoning state: ["));
    }

    #[tokio::test]
    async fn test_multiscale_disabled_leaves_no_vector() {
        let mut loop_ = adaptive(
            VerificationResult::new(true, 0.95),
            RedoConfig::default(),
            ActConfig::default(),
            MultiScaleConfig::default(),
        );

        let outcome = loop_.execute("summarize", None, None).await.unwrap();
        assert!(outcome.reasoning_state.is_empty());
    }
}
