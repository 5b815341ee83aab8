//! Evolutionary candidate pool engine.
//!
//! Runs budget-controlled generations of reflective mutation and
//! module-level merge over a pool of prompt candidates, gating proposals
//! on a cheap minibatch before paying for full-suite evaluation, and
//! maintaining a Pareto frontier over average score and success rate.
//!
//! The engine is constructed per optimization run and owns its pool,
//! history, and RNG; it is never a shared singleton. Evaluation always
//! goes through the injected [`Verifier`] — there is no simulated score
//! fallback in this crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::models::{
    CandidatePool, CandidateStrategy, EvaluationTask, EvolutionConfig, PerformanceVector,
    PromptCandidate, TaskEvaluation,
};
use crate::domain::ports::{Generator, Verifier};

/// Weakness categories detected in verification feedback during
/// reflective mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weakness {
    Accuracy,
    Clarity,
    Completeness,
}

impl Weakness {
    /// Keywords whose presence in feedback signals this weakness.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Weakness::Accuracy => &["incorrect", "wrong", "inaccurate", "error", "mistake"],
            Weakness::Clarity => &["unclear", "ambiguous", "confusing", "vague", "hard to follow"],
            Weakness::Completeness => &["missing", "incomplete", "partial", "omitted", "left out"],
        }
    }

    /// Targeted instruction appended to a mutated prompt.
    fn instruction(&self) -> &'static str {
        match self {
            Weakness::Accuracy => {
                "Verify each factual claim against the provided material before stating it."
            }
            Weakness::Clarity => {
                "State the answer in short, direct sentences and define technical terms on first use."
            }
            Weakness::Completeness => {
                "Address every part of the task explicitly, including edge cases, before concluding."
            }
        }
    }
}

/// Fallback instruction when feedback names no recognizable weakness.
const GENERIC_REFINEMENT: &str =
    "Re-read the task and state your reasoning step by step before giving the final answer.";

/// Domain terms counted by the merge heuristic as a proxy for prompt
/// sophistication.
const TECHNICAL_TERMS: &[&str] = &[
    "analyze", "verify", "constraint", "criteria", "structured", "context", "evidence",
    "step", "format", "source", "precise", "validate",
];

/// Markers that indicate enumerated detail within a prompt module.
fn has_detail_marker(module: &str) -> bool {
    let trimmed = module.trim_start();
    if trimmed.starts_with('-')
        || trimmed.starts_with('*')
        || trimmed.starts_with('\u{2022}')
        || trimmed.starts_with("Step")
    {
        return true;
    }
    // Numbered marker: one or more leading digits followed by a dot.
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && trimmed.chars().nth(digits) == Some('.')
}

/// Cheap "evolution level" score for one prompt module: a proxy for
/// length, enumerated detail, and domain technical-term density.
fn evolution_level(module: &str) -> f64 {
    let lower = module.to_lowercase();
    let length_score = module.len() as f64 / 80.0;
    let marker_score = if has_detail_marker(module) { 1.0 } else { 0.0 };
    let term_score = TECHNICAL_TERMS
        .iter()
        .filter(|term| lower.contains(**term))
        .count() as f64;
    length_score + marker_score + term_score
}

/// Detect weakness categories named in a batch of feedback strings.
fn detect_weaknesses(feedback: &[String]) -> Vec<Weakness> {
    let combined = feedback.join(" ").to_lowercase();
    [Weakness::Accuracy, Weakness::Clarity, Weakness::Completeness]
        .into_iter()
        .filter(|w| w.keywords().iter().any(|k| combined.contains(k)))
        .collect()
}

/// One row of the run history, recorded per generation attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: u32,
    pub strategy: CandidateStrategy,
    pub admitted: bool,
    /// Best full-suite average score in the pool after this generation.
    pub best_score: f64,
    pub pool_size: usize,
    pub frontier_size: usize,
}

/// Aggregate view of a finished (or in-progress) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionSummary {
    pub generations_attempted: usize,
    pub candidates_admitted: usize,
    pub best_score: f64,
    /// Least-squares slope of best_score over generations.
    pub improvement_trend: f64,
    /// Best-score improvement per evaluation unit consumed.
    pub efficiency: f64,
    pub frontier_size: usize,
}

/// Evolutionary candidate pool engine.
pub struct EvolutionEngine {
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    config: EvolutionConfig,
    rng: StdRng,
    history: Vec<GenerationRecord>,
}

impl EvolutionEngine {
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
        config: EvolutionConfig,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            generator,
            verifier,
            config,
            rng,
            history: Vec::new(),
        }
    }

    /// Run the full evolution loop and return the final pool.
    ///
    /// Seed candidates are evaluated on the full suite up front without
    /// consuming budget; each subsequent generation consumes exactly
    /// `minibatch_size` units whether or not its proposal is admitted.
    pub async fn evolve(&mut self, seeds: &[String]) -> EngineResult<CandidatePool> {
        self.validate(seeds)?;

        let mut pool = CandidatePool::new(self.config.budget);

        for seed in seeds {
            let mut candidate = PromptCandidate::seed(seed.clone());
            let (evals, performance) = self.evaluate_on_tasks(&candidate.text, None).await?;
            candidate.evaluation_results = evals;
            candidate.performance = performance;
            pool.admit(candidate);
        }

        tracing::info!(
            seeds = seeds.len(),
            budget = pool.evolution_budget,
            tasks = self.config.tasks.len(),
            "starting evolution run"
        );

        while pool.has_budget() {
            pool.current_generation += 1;
            let generation = pool.current_generation;

            let use_mutation = self.rng.gen_bool(self.config.mutation_probability)
                || pool.pareto_frontier.len() < 2;
            let strategy = if use_mutation {
                CandidateStrategy::Mutation
            } else {
                CandidateStrategy::Merge
            };

            let proposal = match strategy {
                CandidateStrategy::Mutation => self.propose_mutation(&pool).await?,
                CandidateStrategy::Merge => self.propose_merge(&pool),
                CandidateStrategy::Seed => unreachable!("seeds are never proposed"),
            };

            // Every generation pays the minibatch cost, admitted or not.
            pool.consume_budget(self.config.minibatch_size as i64);

            let admitted = self.gate_and_admit(proposal, &mut pool).await?;

            let best_score = pool
                .candidates
                .iter()
                .map(PromptCandidate::average_score)
                .fold(0.0, f64::max);

            self.history.push(GenerationRecord {
                generation,
                strategy,
                admitted,
                best_score,
                pool_size: pool.candidates.len(),
                frontier_size: pool.pareto_frontier.len(),
            });

            tracing::debug!(
                generation,
                ?strategy,
                admitted,
                best_score,
                budget = pool.evolution_budget,
                "generation complete"
            );

            if let Some(threshold) = self.config.convergence_threshold {
                if best_score >= threshold {
                    tracing::info!(generation, best_score, "converged early");
                    break;
                }
            }
        }

        tracing::info!(
            generations = self.history.len(),
            pool_size = pool.candidates.len(),
            frontier = pool.pareto_frontier.len(),
            "evolution run finished"
        );

        Ok(pool)
    }

    /// Aggregate view of the run so far.
    pub fn summary(&self, pool: &CandidatePool) -> EvolutionSummary {
        let best_score = self.history.last().map(|r| r.best_score).unwrap_or(0.0);
        let consumed = self.config.budget - pool.evolution_budget;
        let efficiency = if !self.history.is_empty() && consumed > 0 {
            (best_score - self.history[0].best_score) / consumed as f64
        } else {
            0.0
        };

        EvolutionSummary {
            generations_attempted: self.history.len(),
            candidates_admitted: self.history.iter().filter(|r| r.admitted).count(),
            best_score,
            improvement_trend: self.improvement_trend(),
            efficiency,
            frontier_size: pool.pareto_frontier.len(),
        }
    }

    pub fn history(&self) -> &[GenerationRecord] {
        &self.history
    }

    fn validate(&self, seeds: &[String]) -> EngineResult<()> {
        if self.config.budget <= 0 {
            return Err(EngineError::InvalidConfig("budget must be positive".into()));
        }
        if self.config.minibatch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "minibatch_size must be at least 1".into(),
            ));
        }
        if self.config.tasks.is_empty() {
            return Err(EngineError::InvalidConfig(
                "evaluation task suite is empty".into(),
            ));
        }
        // Each probability must lie in [0, 1] on its own: gen_bool panics
        // outside that range, so a sum check alone is not enough.
        let in_unit = |p: f64| (0.0..=1.0).contains(&p);
        let prob_sum = self.config.mutation_probability + self.config.merge_probability;
        if !in_unit(self.config.mutation_probability)
            || !in_unit(self.config.merge_probability)
            || (prob_sum - 1.0).abs() > 1e-6
        {
            return Err(EngineError::InvalidConfig(format!(
                "mutation_probability {} and merge_probability {} must each lie in [0, 1] and sum to 1.0",
                self.config.mutation_probability, self.config.merge_probability
            )));
        }
        // Merge needs two distinct frontier members, so two seeds is the
        // floor whenever merge can be chosen.
        let required = if self.config.merge_probability > 0.0 { 2 } else { 1 };
        if seeds.len() < required {
            return Err(EngineError::InsufficientSeeds {
                required,
                provided: seeds.len(),
            });
        }
        Ok(())
    }

    /// Reflective mutation: execute a frontier parent on a fresh
    /// minibatch, read the verifier's feedback for named weaknesses, and
    /// append one targeted instruction per detected weakness.
    async fn propose_mutation(&mut self, pool: &CandidatePool) -> EngineResult<PromptCandidate> {
        let parent = self
            .sample_frontier(pool, 1)
            .pop()
            .ok_or_else(|| EngineError::InvalidConfig("candidate pool is empty".into()))?;
        let minibatch = self.sample_minibatch();

        let (evals, _) = self
            .evaluate_on_tasks(&parent.text, Some(&minibatch))
            .await?;
        let feedback: Vec<String> = evals.values().map(|e| e.feedback.clone()).collect();
        let weaknesses = detect_weaknesses(&feedback);

        let mut text = parent.text.clone();
        if weaknesses.is_empty() {
            text.push_str(&format!("\n{GENERIC_REFINEMENT}"));
        } else {
            for weakness in &weaknesses {
                text.push_str(&format!("\n{}", weakness.instruction()));
            }
        }

        tracing::debug!(
            parent = %parent.id,
            weaknesses = weaknesses.len(),
            "proposing mutation"
        );

        Ok(PromptCandidate::derived(
            text,
            &[&parent],
            CandidateStrategy::Mutation,
        ))
    }

    /// Module-level merge: split both parents into newline-delimited
    /// modules and keep, per position, the module with the higher
    /// evolution level. Ties break randomly.
    fn propose_merge(&mut self, pool: &CandidatePool) -> PromptCandidate {
        let parents = self.sample_frontier(pool, 2);
        let (a, b) = (&parents[0], &parents[1]);

        let a_modules: Vec<&str> = a.text.lines().collect();
        let b_modules: Vec<&str> = b.text.lines().collect();
        let positions = a_modules.len().max(b_modules.len());

        let mut merged: Vec<&str> = Vec::with_capacity(positions);
        for i in 0..positions {
            let module = match (a_modules.get(i), b_modules.get(i)) {
                (Some(am), Some(bm)) => {
                    let (al, bl) = (evolution_level(am), evolution_level(bm));
                    if al > bl {
                        am
                    } else if bl > al {
                        bm
                    } else if self.rng.gen_bool(0.5) {
                        am
                    } else {
                        bm
                    }
                }
                (Some(am), None) => am,
                (None, Some(bm)) => bm,
                (None, None) => unreachable!("position bounded by max length"),
            };
            merged.push(module);
        }

        tracing::debug!(parent_a = %a.id, parent_b = %b.id, "proposing merge");

        PromptCandidate::derived(merged.join("\n"), &[a, b], CandidateStrategy::Merge)
    }

    /// Minibatch gate followed by full admission.
    ///
    /// The proposal is executed on a fresh minibatch; it enters the pool
    /// only if it beats its parents' full-suite performance by the
    /// configured relative margin, or the frontier average by the smaller
    /// margin. Rejected proposals are discarded silently — budget was
    /// already consumed, and there is no retry.
    async fn gate_and_admit(
        &mut self,
        mut proposal: PromptCandidate,
        pool: &mut CandidatePool,
    ) -> EngineResult<bool> {
        let minibatch = self.sample_minibatch();
        let (gate_evals, _) = self
            .evaluate_on_tasks(&proposal.text, Some(&minibatch))
            .await?;

        let n = gate_evals.len().max(1) as f64;
        let gate_avg = gate_evals.values().map(|e| e.score).sum::<f64>() / n;
        let gate_sr = gate_evals.values().filter(|e| e.success).count() as f64 / n;

        let parent_margin = 1.0 + self.config.performance_threshold;
        let frontier_margin = 1.0 + self.config.frontier_threshold;

        let (parent_avg, parent_sr) = proposal
            .parent_ids
            .iter()
            .filter_map(|id| pool.get(*id))
            .map(|p| (p.average_score(), p.success_rate()))
            .fold((0.0_f64, 0.0_f64), |(acc_a, acc_s), (a, s)| {
                (acc_a.max(a), acc_s.max(s))
            });

        let (frontier_avg, frontier_sr) = pool.frontier_averages();

        let beats_parent =
            gate_avg > parent_avg * parent_margin || gate_sr > parent_sr * parent_margin;
        let beats_frontier =
            gate_avg > frontier_avg * frontier_margin || gate_sr > frontier_sr * frontier_margin;

        if !beats_parent && !beats_frontier {
            tracing::debug!(gate_avg, gate_sr, "proposal rejected by minibatch gate");
            return Ok(false);
        }

        // Full admission: evaluate on every task in the fixed suite.
        let (evals, performance) = self.evaluate_on_tasks(&proposal.text, None).await?;
        proposal.evaluation_results = evals;
        proposal.performance = performance;
        pool.admit(proposal);
        Ok(true)
    }

    /// Sample `count` distinct candidates uniformly from the frontier.
    ///
    /// Callers guarantee the frontier is large enough: a non-empty pool
    /// always has a non-empty frontier, and merge is only chosen when the
    /// frontier holds at least two members.
    fn sample_frontier(&mut self, pool: &CandidatePool, count: usize) -> Vec<PromptCandidate> {
        pool.frontier_candidates()
            .choose_multiple(&mut self.rng, count)
            .map(|c| (*c).clone())
            .collect()
    }

    fn sample_minibatch(&mut self) -> Vec<EvaluationTask> {
        let n = self.config.minibatch_size.min(self.config.tasks.len());
        self.config
            .tasks
            .choose_multiple(&mut self.rng, n)
            .cloned()
            .collect()
    }

    /// Execute a prompt on a task set through the Generator/Verifier
    /// pair, producing per-task evaluations and a performance vector.
    ///
    /// `tasks = None` means the full fixed suite.
    async fn evaluate_on_tasks(
        &self,
        prompt_text: &str,
        tasks: Option<&[EvaluationTask]>,
    ) -> EngineResult<(HashMap<String, TaskEvaluation>, PerformanceVector)> {
        let suite: Vec<EvaluationTask> = match tasks {
            Some(t) => t.to_vec(),
            None => self.config.tasks.clone(),
        };

        let mut evals = HashMap::with_capacity(suite.len());
        let mut total_latency_ms = 0.0;

        for task in &suite {
            let started = Instant::now();
            let full_prompt = format!("{prompt_text}\n\nTask:\n{}", task.input);
            let answer = self.generator.generate(&full_prompt).await?;
            let verification = self
                .verifier
                .verify(&task.input, &answer, None, task.expected.as_ref())
                .await?;
            total_latency_ms += started.elapsed().as_secs_f64() * 1000.0;

            let mut feedback_parts = verification.errors.clone();
            feedback_parts.extend(verification.suggestions.iter().cloned());

            evals.insert(
                task.id.clone(),
                TaskEvaluation {
                    success: verification.is_valid,
                    score: verification.quality_score(),
                    feedback: feedback_parts.join("; "),
                },
            );
        }

        let n = evals.len().max(1) as f64;
        let accuracy = evals.values().map(|e| e.score).sum::<f64>() / n;
        let success_rate = evals.values().filter(|e| e.success).count() as f64 / n;

        let performance = PerformanceVector {
            accuracy,
            latency_ms: total_latency_ms / n,
            // Rough 4-chars-per-token estimate of the prompt's own cost.
            cost: prompt_text.len() as f64 / 4.0,
            risk: 1.0 - success_rate,
        };

        Ok((evals, performance))
    }

    fn improvement_trend(&self) -> f64 {
        if self.history.len() < 2 {
            return 0.0;
        }
        let n = self.history.len() as f64;
        let xs = 0..self.history.len();
        let sum_x: f64 = xs.clone().map(|x| x as f64).sum();
        let sum_y: f64 = self.history.iter().map(|r| r.best_score).sum();
        let sum_xy: f64 = xs
            .clone()
            .zip(self.history.iter())
            .map(|(x, r)| x as f64 * r.best_score)
            .sum();
        let sum_x2: f64 = xs.map(|x| (x as f64).powi(2)).sum();

        let denominator = n * sum_x2 - sum_x.powi(2);
        if denominator.abs() < f64::EPSILON {
            return 0.0;
        }
        (n * sum_xy - sum_x * sum_y) / denominator
    }
}
