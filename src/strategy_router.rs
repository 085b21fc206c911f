use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution, Normal};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::model::features::ContextFeatures;

/// Reward-belief family used for every policy posterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardModel {
    Beta,
    Normal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub reward_model: RewardModel,
    /// Scale of the 1/sqrt(times_chosen) exploration bonus.
    pub exploration_coefficient: f64,
    /// Step size for the contextual weight update.
    pub learning_rate: f64,
    pub beta_prior_alpha: f64,
    pub beta_prior_beta: f64,
    pub normal_prior_mean: f64,
    pub normal_prior_variance: f64,
    /// Observation noise assumed by the Normal conjugate update.
    pub normal_observation_noise: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            reward_model: RewardModel::Beta,
            exploration_coefficient: 0.30,
            learning_rate: 0.05,
            // Uninformative priors keep early choices close to uniform.
            beta_prior_alpha: 1.0,
            beta_prior_beta: 1.0,
            normal_prior_mean: 0.0,
            normal_prior_variance: 1.0,
            normal_observation_noise: 0.25,
        }
    }
}

/// Reward belief plus contextual weights for one policy.
#[derive(Debug, Clone)]
pub struct PolicyPosterior {
    pub alpha: f64,
    pub beta: f64,
    pub mean: f64,
    pub variance: f64,
    pub times_chosen: u64,
    pub observations: u64,
    pub weights: [f64; ContextFeatures::DIM],
}

impl PolicyPosterior {
    fn new(config: &RouterConfig) -> PolicyPosterior {
        PolicyPosterior {
            alpha: config.beta_prior_alpha.max(1e-3),
            beta: config.beta_prior_beta.max(1e-3),
            mean: config.normal_prior_mean,
            variance: config.normal_prior_variance.max(1e-6),
            times_chosen: 0,
            observations: 0,
            weights: [0.0; ContextFeatures::DIM],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouterChoice {
    pub policy_id: String,
    pub score: f64,
    pub exploration_bonus: f64,
}

/// Contextual Thompson-sampling policy router.
///
/// Each policy carries a reward posterior (Beta or Normal) and a linear
/// contextual adjustment. `choose` samples each posterior, adds the
/// contextual term and an exploration bonus, and picks the arg-max.
pub struct StrategyRouter {
    config: RouterConfig,
    posteriors: BTreeMap<String, PolicyPosterior>,
    rng: StdRng,
}

impl StrategyRouter {
    pub fn new(
        config: RouterConfig,
        policy_ids: impl IntoIterator<Item = String>,
    ) -> StrategyRouter {
        Self::with_rng(config, policy_ids, StdRng::from_entropy())
    }

    /// Deterministic router for tests and replay.
    pub fn with_seed(
        config: RouterConfig,
        policy_ids: impl IntoIterator<Item = String>,
        seed: u64,
    ) -> StrategyRouter {
        Self::with_rng(config, policy_ids, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        config: RouterConfig,
        policy_ids: impl IntoIterator<Item = String>,
        rng: StdRng,
    ) -> StrategyRouter {
        let posteriors = policy_ids
            .into_iter()
            .map(|id| {
                let posterior = PolicyPosterior::new(&config);
                (id, posterior)
            })
            .collect();
        StrategyRouter {
            config,
            posteriors,
            rng,
        }
    }

    pub fn posterior(&self, policy_id: &str) -> Option<&PolicyPosterior> {
        self.posteriors.get(policy_id)
    }

    /// Select the acting policy for this tick.
    pub fn choose(&mut self, features: &ContextFeatures) -> Result<RouterChoice, PipelineError> {
        if self.posteriors.is_empty() {
            return Err(PipelineError::EmptyCatalog);
        }

        let x = features.to_vector();
        let rng = &mut self.rng;
        let mut best: Option<RouterChoice> = None;
        for (id, posterior) in &self.posteriors {
            let sampled = sample_reward(&self.config, rng, posterior);
            let contextual: f64 = posterior
                .weights
                .iter()
                .zip(x.iter())
                .map(|(w, f)| w * f)
                .sum();
            let bonus =
                self.config.exploration_coefficient / (posterior.times_chosen.max(1) as f64).sqrt();
            let score = sampled + contextual + bonus;

            let better = match &best {
                Some(current) => score > current.score,
                None => true,
            };
            if better {
                best = Some(RouterChoice {
                    policy_id: id.clone(),
                    score,
                    exploration_bonus: bonus,
                });
            }
        }

        let choice = best.expect("non-empty posterior map always yields a choice");
        if let Some(posterior) = self.posteriors.get_mut(&choice.policy_id) {
            posterior.times_chosen += 1;
        }
        Ok(choice)
    }

    /// Fold one realized reward into the chosen policy's posterior and take
    /// one gradient step on its contextual weights.
    pub fn update(
        &mut self,
        policy_id: &str,
        reward: f64,
        features: &ContextFeatures,
    ) -> Result<(), PipelineError> {
        let learning_rate = self.config.learning_rate;
        let observation_noise = self.config.normal_observation_noise.max(1e-6);
        let posterior = self
            .posteriors
            .get_mut(policy_id)
            .ok_or_else(|| PipelineError::UnknownPolicy(policy_id.to_string()))?;

        if !reward.is_finite() {
            return Ok(());
        }

        if reward > 0.0 {
            posterior.alpha += 1.0;
        } else {
            posterior.beta += 1.0;
        }

        let precision = 1.0 / posterior.variance + 1.0 / observation_noise;
        let variance = 1.0 / precision;
        posterior.mean =
            variance * (posterior.mean / posterior.variance + reward / observation_noise);
        posterior.variance = variance;

        let x = features.to_vector();
        for (w, f) in posterior.weights.iter_mut().zip(x.iter()) {
            *w += learning_rate * reward * f;
        }
        posterior.observations += 1;
        Ok(())
    }
}

fn sample_reward(config: &RouterConfig, rng: &mut StdRng, posterior: &PolicyPosterior) -> f64 {
    match config.reward_model {
        RewardModel::Beta => match Beta::new(posterior.alpha, posterior.beta) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0.0..1.0),
        },
        RewardModel::Normal => {
            match Normal::new(posterior.mean, posterior.variance.sqrt().max(1e-6)) {
                Ok(dist) => dist.sample(rng),
                Err(_) => posterior.mean,
            }
        }
    }
}
