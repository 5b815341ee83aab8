//! Verify-regenerate loop.
//!
//! Runs up to `max_iterations` cycles of generate -> verify -> correct for
//! a single task. Iteration 0 uses the bare task (plus context); later
//! iterations rebuild the prompt with the previous attempt's errors and
//! suggestions threaded in as numbered corrections.
//!
//! The loop always returns: it never blocks indefinitely and never
//! discards history. On exhaustion or timeout it returns the best-quality
//! attempt seen, with `verified: false` for the caller to check.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::domain::error::EngineResult;
use crate::domain::models::{MultiStepResult, RedoConfig, RedoIteration, RedoResult};
use crate::domain::ports::{Generator, Verifier};

/// Verify-regenerate loop over injected Generator/Verifier capabilities.
///
/// One instance owns its config and is intended for one logical caller;
/// it holds no cross-run mutable state.
pub struct RedoLoop {
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    config: RedoConfig,
}

impl RedoLoop {
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
        config: RedoConfig,
    ) -> Self {
        Self {
            generator,
            verifier,
            config,
        }
    }

    pub fn config(&self) -> &RedoConfig {
        &self.config
    }

    /// Run the loop for one task.
    ///
    /// Generator or Verifier failures propagate as errors; a verification
    /// that misses the threshold is expected control flow and triggers
    /// regeneration instead.
    pub async fn execute_with_verification(
        &self,
        task: &str,
        context: Option<&str>,
        ground_truth: Option<&serde_json::Value>,
    ) -> EngineResult<RedoResult> {
        let start = Instant::now();
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut attempts: Vec<RedoIteration> = Vec::new();

        for iteration in 0..self.config.max_iterations {
            // Timeout is cooperative: checked only at iteration
            // boundaries, so an in-flight capability call is never
            // interrupted. Iteration 0 always runs so the result carries
            // at least one attempt.
            if iteration > 0 && start.elapsed() >= timeout {
                tracing::warn!(
                    iteration,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "redo loop timed out, returning best attempt so far"
                );
                break;
            }

            let prompt = self.build_prompt(task, context, attempts.last());
            let answer = self.generator.generate(&prompt).await?;
            let verification = self
                .verifier
                .verify(task, &answer, context, ground_truth)
                .await?;

            tracing::debug!(
                iteration,
                confidence = verification.confidence,
                is_valid = verification.is_valid,
                "redo iteration verified"
            );

            let verified_now = verification.meets_threshold(self.config.confidence_threshold);
            attempts.push(RedoIteration {
                iteration,
                answer,
                verification,
                timestamp: Utc::now(),
                prompt_used: prompt,
                model: self.config.model.clone(),
            });

            if verified_now {
                tracing::info!(iteration, "redo loop verified");
                let elapsed_ms = start.elapsed().as_millis() as u64;
                let verified_index = attempts.len() - 1;
                return Ok(RedoResult::from_attempts(
                    attempts,
                    Some(verified_index),
                    elapsed_ms,
                ));
            }
        }

        tracing::info!(
            attempts = attempts.len(),
            "redo loop exhausted, returning best attempt"
        );
        let elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(RedoResult::from_attempts(attempts, None, elapsed_ms))
    }

    /// Chain independent sub-tasks, feeding each step's verified-or-best
    /// answer into the next step's context.
    ///
    /// The `error_propagation` flag is a heuristic correlation: it is set
    /// when a later step fails while any earlier step was unverified, and
    /// does not prove the earlier failure caused the later one.
    pub async fn execute_multi_step(
        &self,
        steps: &[String],
        initial_context: Option<&str>,
    ) -> EngineResult<MultiStepResult> {
        let start = Instant::now();
        let mut step_results: Vec<RedoResult> = Vec::new();
        let mut context = initial_context.map(str::to_string).unwrap_or_default();
        let mut any_unverified = false;
        let mut error_propagation = false;

        for (index, step) in steps.iter().enumerate() {
            let step_context = if context.is_empty() {
                None
            } else {
                Some(context.as_str())
            };

            let result = self
                .execute_with_verification(step, step_context, None)
                .await?;

            if !result.verified {
                if any_unverified && index > 0 {
                    error_propagation = true;
                }
                any_unverified = true;
            }

            context.push_str(&format!(
                "\nStep {} result: {}",
                index + 1,
                result.final_answer
            ));
            step_results.push(result);
        }

        let all_verified = step_results.iter().all(|r| r.verified);
        Ok(MultiStepResult {
            step_results,
            all_verified,
            error_propagation,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn build_prompt(
        &self,
        task: &str,
        context: Option<&str>,
        previous: Option<&RedoIteration>,
    ) -> String {
        build_correction_prompt(task, context, previous)
    }
}

/// Build the prompt for the next attempt.
///
/// Iteration 0: bare task plus context. Later iterations append the
/// previous verification's errors and suggestions as numbered lists with
/// an explicit correction instruction. Shared with the adaptive loop.
pub(crate) fn build_correction_prompt(
    task: &str,
    context: Option<&str>,
    previous: Option<&RedoIteration>,
) -> String {
    let mut prompt = String::new();

    if let Some(ctx) = context {
        prompt.push_str("Context:\n");
        prompt.push_str(ctx);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Task:\n");
    prompt.push_str(task);

    if let Some(prev) = previous {
        prompt.push_str("\n\nYour previous answer was:\n");
        prompt.push_str(&prev.answer);

        if !prev.verification.errors.is_empty() {
            prompt.push_str("\n\nErrors found:\n");
            for (i, error) in prev.verification.errors.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, error));
            }
        }

        if !prev.verification.suggestions.is_empty() {
            prompt.push_str("\nSuggestions:\n");
            for (i, suggestion) in prev.verification.suggestions.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, suggestion));
            }
        }

        prompt.push_str(
            "\nProduce a corrected answer that fixes every listed error and applies the suggestions.",
        );
    }

    prompt
}
