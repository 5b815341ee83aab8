use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid budget: {0}. Must be positive")]
    InvalidBudget(i64),

    #[error("Invalid minibatch_size: {0}. Must be at least 1")]
    InvalidMinibatchSize(usize),

    #[error(
        "Invalid strategy probabilities: mutation {0} + merge {1} must sum to 1.0 and each lie in [0, 1]"
    )]
    InvalidStrategyProbabilities(f64, f64),

    #[error("Invalid {name}: {value}. Must be between 0.0 and 1.0")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("Invalid max_iterations: {0}. Cannot be 0")]
    InvalidMaxIterations(u32),

    #[error("Invalid timeout_ms: {0}. Must be positive")]
    InvalidTimeout(u64),

    #[error("Invalid ema_decay: {0}. Must be strictly between 0.0 and 1.0")]
    InvalidEmaDecay(f64),

    #[error("Invalid learning_rate: {0}. Must be positive")]
    InvalidLearningRate(f64),

    #[error("Invalid latent_dim: {0}. Must be at least 1 when multiscale is enabled")]
    InvalidLatentDim(usize),

    #[error("scale_factors cannot be empty when multiscale is enabled")]
    EmptyScaleFactors,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. promptly.yaml in the working directory (optional)
    /// 3. Environment variables (PROMPTLY_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("promptly.yaml"))
            .merge(Env::prefixed("PROMPTLY_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let evo = &config.evolution;

        if evo.budget <= 0 {
            return Err(ConfigError::InvalidBudget(evo.budget));
        }

        if evo.minibatch_size == 0 {
            return Err(ConfigError::InvalidMinibatchSize(evo.minibatch_size));
        }

        let in_unit = |p: f64| (0.0..=1.0).contains(&p);
        let prob_sum = evo.mutation_probability + evo.merge_probability;
        if !in_unit(evo.mutation_probability)
            || !in_unit(evo.merge_probability)
            || (prob_sum - 1.0).abs() > 1e-6
        {
            return Err(ConfigError::InvalidStrategyProbabilities(
                evo.mutation_probability,
                evo.merge_probability,
            ));
        }

        for (name, value) in [
            ("performance_threshold", evo.performance_threshold),
            ("frontier_threshold", evo.frontier_threshold),
            (
                "confidence_threshold",
                config.redo.confidence_threshold,
            ),
            ("halt_threshold", config.act.halt_threshold),
            ("continue_threshold", config.act.continue_threshold),
        ] {
            if !in_unit(value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if let Some(convergence) = evo.convergence_threshold {
            if !in_unit(convergence) {
                return Err(ConfigError::ThresholdOutOfRange {
                    name: "convergence_threshold",
                    value: convergence,
                });
            }
        }

        if config.redo.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(config.redo.max_iterations));
        }

        if config.redo.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(config.redo.timeout_ms));
        }

        if config.act.ema_decay <= 0.0 || config.act.ema_decay >= 1.0 {
            return Err(ConfigError::InvalidEmaDecay(config.act.ema_decay));
        }

        if config.act.learning_rate <= 0.0 {
            return Err(ConfigError::InvalidLearningRate(config.act.learning_rate));
        }

        if config.multiscale.enable_multiscale {
            if config.multiscale.latent_dim == 0 {
                return Err(ConfigError::InvalidLatentDim(config.multiscale.latent_dim));
            }
            if config.multiscale.scale_factors.is_empty() {
                return Err(ConfigError::EmptyScaleFactors);
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
