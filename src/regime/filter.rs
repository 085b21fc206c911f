use nalgebra::{DMatrix, DVector};

use crate::model::belief::{LatentState, RegimeBelief, RegimeEntry, REGIME_COUNT};
use crate::model::observation::Observation;
use crate::regime::matrix::{gaussian_likelihood, guarded_inverse, symmetrize};
use crate::regime::model::RegimeModelSet;

/// An externally supplied categorical prior may never contribute more than
/// this to the HMM-predicted regime prior.
pub const MAX_EXTERNAL_PRIOR_WEIGHT: f64 = 0.10;

/// Blend toward uniform applied when an observation is malformed.
const DEGRADE_BLEND: f64 = 0.10;

/// Output of one filter step.
#[derive(Debug, Clone)]
pub struct RegimeEstimate {
    pub state: LatentState,
    pub belief: RegimeBelief,
    /// Trace of the mixed state covariance.
    pub uncertainty: f64,
}

/// Gaussian-mixture jump-linear filter: a bank of per-regime Kalman filters
/// sharing one collapsed state, mixed by an HMM regime posterior (GPB1).
///
/// The filter never errors. Numeric degeneracy regularizes locally and
/// malformed observations relax the posterior toward uniform instead of
/// corrupting state.
pub struct RegimeFilter {
    models: RegimeModelSet,
    state: DVector<f64>,
    covariance: DMatrix<f64>,
    posterior: Vec<f64>,
    external_prior_weight: f64,
    tick: u64,
}

impl RegimeFilter {
    pub fn new(models: RegimeModelSet, external_prior_weight: f64) -> RegimeFilter {
        let dim = LatentState::DIM;
        let covariance = DMatrix::identity(dim, dim) * models.initial_covariance_diag;
        let posterior = models.initial_prior.clone();
        RegimeFilter {
            models,
            state: DVector::zeros(dim),
            covariance,
            posterior,
            external_prior_weight: external_prior_weight.clamp(0.0, MAX_EXTERNAL_PRIOR_WEIGHT),
            tick: 0,
        }
    }

    pub fn model_version(&self) -> &str {
        &self.models.version
    }

    /// Advance the filter by one tick.
    pub fn step(
        &mut self,
        observation: &Observation,
        external_prior: Option<&[f64]>,
    ) -> RegimeEstimate {
        self.tick += 1;

        if !observation.is_finite() {
            tracing::warn!(
                tick = self.tick,
                "Non-finite observation, degrading regime posterior toward uniform"
            );
            self.degrade_toward_uniform();
            return self.estimate();
        }

        let z = observation.to_vector();
        let dim = LatentState::DIM;
        let identity = DMatrix::<f64>::identity(dim, dim);

        let mut states = Vec::with_capacity(REGIME_COUNT);
        let mut covariances = Vec::with_capacity(REGIME_COUNT);
        let mut likelihoods = Vec::with_capacity(REGIME_COUNT);

        for model in &self.models.regimes {
            // Predict from the shared collapsed state.
            let predicted_state = &model.state_transition * &self.state;
            let predicted_cov = symmetrize(
                &(&model.state_transition * &self.covariance * model.state_transition.transpose()
                    + &model.process_noise),
            );

            let innovation = &z - &model.observation * &predicted_state;
            let innovation_cov = symmetrize(
                &(&model.observation * &predicted_cov * model.observation.transpose()
                    + &model.observation_noise),
            );
            let gain = &predicted_cov * model.observation.transpose() * guarded_inverse(&innovation_cov);

            let updated_state = &predicted_state + &gain * &innovation;
            let updated_cov = symmetrize(&((&identity - &gain * &model.observation) * &predicted_cov));

            likelihoods.push(gaussian_likelihood(&innovation, &innovation_cov));
            states.push(updated_state);
            covariances.push(updated_cov);
        }

        self.update_posterior(&likelihoods, external_prior);
        self.collapse(&states, &covariances);
        self.estimate()
    }

    /// HMM-predict the prior, blend an optional external hint at a capped
    /// weight, multiply by likelihoods, renormalize. Underflow resets to
    /// uniform rather than propagating non-finite mass.
    fn update_posterior(&mut self, likelihoods: &[f64], external_prior: Option<&[f64]>) {
        let mut predicted = vec![0.0; REGIME_COUNT];
        for (r, slot) in predicted.iter_mut().enumerate() {
            for (s, post) in self.posterior.iter().enumerate() {
                *slot += self.models.hmm_transition[(s, r)] * post;
            }
        }

        if let Some(external) = validated_external_prior(external_prior) {
            let w = self.external_prior_weight;
            for (slot, ext) in predicted.iter_mut().zip(external.iter()) {
                *slot = (1.0 - w) * *slot + w * ext;
            }
        }

        let mut updated: Vec<f64> = predicted
            .iter()
            .zip(likelihoods.iter())
            .map(|(prior, like)| prior * like)
            .collect();
        let sum: f64 = updated.iter().sum();
        if !sum.is_finite() || sum <= 0.0 {
            tracing::warn!(tick = self.tick, "Regime likelihood mass underflowed, resetting to uniform");
            updated = vec![1.0 / REGIME_COUNT as f64; REGIME_COUNT];
        } else {
            for p in &mut updated {
                *p = (*p / sum).clamp(0.0, 1.0);
            }
        }
        self.posterior = updated;
    }

    /// Probability-weighted mixture over the per-regime updates, with the
    /// cross-regime spread folded into the covariance.
    fn collapse(&mut self, states: &[DVector<f64>], covariances: &[DMatrix<f64>]) {
        let dim = LatentState::DIM;
        let mut mixed_state = DVector::zeros(dim);
        for (w, state) in self.posterior.iter().zip(states.iter()) {
            mixed_state += state * *w;
        }

        let mut mixed_cov = DMatrix::zeros(dim, dim);
        for ((w, state), cov) in self.posterior.iter().zip(states.iter()).zip(covariances.iter()) {
            let spread = state - &mixed_state;
            mixed_cov += (cov + &spread * spread.transpose()) * *w;
        }

        if mixed_state.iter().all(|v| v.is_finite()) && mixed_cov.iter().all(|v| v.is_finite()) {
            self.state = mixed_state;
            self.covariance = symmetrize(&mixed_cov);
        } else {
            tracing::warn!(tick = self.tick, "Non-finite collapse, keeping previous state");
            self.covariance =
                DMatrix::identity(dim, dim) * self.models.initial_covariance_diag;
            self.posterior = vec![1.0 / REGIME_COUNT as f64; REGIME_COUNT];
        }
    }

    fn degrade_toward_uniform(&mut self) {
        let uniform = 1.0 / REGIME_COUNT as f64;
        let mut sum = 0.0;
        for p in &mut self.posterior {
            *p = (1.0 - DEGRADE_BLEND) * *p + DEGRADE_BLEND * uniform;
            sum += *p;
        }
        if sum > 0.0 {
            for p in &mut self.posterior {
                *p /= sum;
            }
        } else {
            self.posterior = vec![uniform; REGIME_COUNT];
        }
    }

    fn estimate(&self) -> RegimeEstimate {
        let regimes = self
            .models
            .regimes
            .iter()
            .zip(self.posterior.iter())
            .map(|(model, p)| RegimeEntry {
                id: model.id,
                probability: *p,
                mean_reversion_strength: model.mean_reversion_strength,
                volatility: model.volatility,
                momentum: model.momentum,
            })
            .collect();
        RegimeEstimate {
            state: LatentState::from_vector(&self.state),
            belief: RegimeBelief { regimes },
            uncertainty: self.covariance.trace(),
        }
    }
}

fn validated_external_prior(external: Option<&[f64]>) -> Option<Vec<f64>> {
    let external = external?;
    if external.len() != REGIME_COUNT {
        return None;
    }
    if external.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return None;
    }
    let sum: f64 = external.iter().sum();
    if sum <= 0.0 {
        return None;
    }
    Some(external.iter().map(|p| p / sum).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_observation() -> Observation {
        Observation {
            price: 100.0,
            volume: 5.0,
            spread: 0.5,
            imbalance: 0.0,
            funding_rate: 0.0,
            gas_price: 20.0,
            social_mentions: 3.0,
        }
    }

    #[test]
    fn posterior_stays_normalized_every_tick() {
        let mut filter = RegimeFilter::new(RegimeModelSet::canonical(), 0.05);
        for _ in 0..20 {
            let estimate = filter.step(&flat_observation(), None);
            assert!(estimate.belief.is_normalized());
        }
    }

    #[test]
    fn malformed_observation_degrades_not_corrupts() {
        let mut filter = RegimeFilter::new(RegimeModelSet::canonical(), 0.0);
        for _ in 0..10 {
            let _ = filter.step(&flat_observation(), None);
        }
        let bad = Observation {
            price: f64::NAN,
            ..flat_observation()
        };
        let estimate = filter.step(&bad, None);
        assert!(estimate.belief.is_normalized());
        assert!(estimate.state.microprice.is_finite());
        assert!(estimate.uncertainty.is_finite());
    }

    #[test]
    fn external_prior_weight_is_capped() {
        let filter = RegimeFilter::new(RegimeModelSet::canonical(), 0.9);
        assert!(filter.external_prior_weight <= MAX_EXTERNAL_PRIOR_WEIGHT);
    }

    #[test]
    fn invalid_external_prior_is_ignored() {
        assert!(validated_external_prior(Some(&[0.5, 0.5])).is_none());
        assert!(validated_external_prior(Some(&[f64::NAN, 0.2, 0.3, 0.5])).is_none());
        assert!(validated_external_prior(Some(&[0.0, 0.0, 0.0, 0.0])).is_none());
        let ok = validated_external_prior(Some(&[2.0, 1.0, 1.0, 0.0])).unwrap();
        assert!((ok.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}
