mod helpers;

use std::sync::Arc;

use promptly::{
    CandidatePool, CandidateStrategy, ConfigLoader, EvaluationTask, EvolutionConfig,
    EvolutionEngine,
};

use helpers::fakes::{EchoLenGenerator, PromptLengthVerifier};

fn task_suite(n: usize) -> Vec<EvaluationTask> {
    (0..n)
        .map(|i| EvaluationTask::new(format!("task-{i}"), format!("Answer question number {i}")))
        .collect()
}

fn seed_prompts() -> Vec<String> {
    vec![
        "Answer the question".to_string(),
        "Answer the question carefully\n- verify each claim\n- cite the source".to_string(),
    ]
}

#[tokio::test]
async fn test_budget_exhausts_in_fixed_generations() {
    let config = EvolutionConfig {
        budget: 20,
        minibatch_size: 5,
        tasks: task_suite(8),
        rng_seed: Some(11),
        ..Default::default()
    };

    let mut engine = EvolutionEngine::new(
        Arc::new(EchoLenGenerator),
        Arc::new(PromptLengthVerifier),
        config,
    );

    let pool = engine.evolve(&seed_prompts()).await.unwrap();

    // 20 units at 5 per generation: exactly 4 generations, then stop.
    assert_eq!(engine.history().len(), 4);
    assert!(pool.evolution_budget <= 0);
    assert!(!pool.has_budget());
}

#[tokio::test]
async fn test_pool_invariants_hold_after_full_run() {
    let config = EvolutionConfig {
        budget: 40,
        minibatch_size: 5,
        tasks: task_suite(8),
        rng_seed: Some(3),
        ..Default::default()
    };

    let mut engine = EvolutionEngine::new(
        Arc::new(EchoLenGenerator),
        Arc::new(PromptLengthVerifier),
        config,
    );

    let pool = engine.evolve(&seed_prompts()).await.unwrap();

    // Seeds are retained and sit at generation zero.
    let seed_count = pool
        .candidates
        .iter()
        .filter(|c| c.metadata.strategy == CandidateStrategy::Seed)
        .count();
    assert_eq!(seed_count, 2);

    for candidate in &pool.candidates {
        // Every candidate has a row in the scores matrix covering the
        // full suite.
        let row = pool.scores_matrix.get(&candidate.id).unwrap();
        assert_eq!(row.len(), 8);

        // Lineage is well-formed: parents present, generations ordered.
        match candidate.metadata.strategy {
            CandidateStrategy::Seed => {
                assert!(candidate.parent_ids.is_empty());
                assert_eq!(candidate.generation, 0);
            }
            CandidateStrategy::Mutation => assert_eq!(candidate.parent_ids.len(), 1),
            CandidateStrategy::Merge => assert_eq!(candidate.parent_ids.len(), 2),
        }
        for parent_id in &candidate.parent_ids {
            let parent = pool.get(*parent_id).unwrap();
            assert!(candidate.generation > parent.generation);
        }
    }

    // Frontier members never dominate each other.
    let frontier = pool.frontier_candidates();
    assert!(!frontier.is_empty());
    for a in &frontier {
        for b in &frontier {
            if a.id != b.id {
                assert!(!CandidatePool::dominates(a, b));
            }
        }
    }
}

#[tokio::test]
async fn test_summary_matches_history() {
    let config = EvolutionConfig {
        budget: 30,
        minibatch_size: 5,
        tasks: task_suite(6),
        rng_seed: Some(5),
        ..Default::default()
    };

    let mut engine = EvolutionEngine::new(
        Arc::new(EchoLenGenerator),
        Arc::new(PromptLengthVerifier),
        config,
    );

    let pool = engine.evolve(&seed_prompts()).await.unwrap();
    let summary = engine.summary(&pool);

    assert_eq!(summary.generations_attempted, engine.history().len());
    assert_eq!(
        summary.candidates_admitted,
        engine.history().iter().filter(|r| r.admitted).count()
    );
    assert_eq!(summary.frontier_size, pool.pareto_frontier.len());
    assert!(summary.best_score >= 0.0 && summary.best_score <= 1.0);
}

#[tokio::test]
async fn test_engine_accepts_loaded_default_config() {
    // The programmatic defaults pass validation and drive a real run once
    // a task suite is attached.
    let mut config = promptly::Config::default();
    ConfigLoader::validate(&config).unwrap();

    config.evolution.tasks = task_suite(6);
    config.evolution.budget = 10;
    config.evolution.rng_seed = Some(1);

    let mut engine = EvolutionEngine::new(
        Arc::new(EchoLenGenerator),
        Arc::new(PromptLengthVerifier),
        config.evolution,
    );

    let pool = engine.evolve(&seed_prompts()).await.unwrap();
    assert_eq!(engine.history().len(), 2);
    assert!(pool.candidates.len() >= 2);
}
