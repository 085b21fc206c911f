use std::path::Path;

use nalgebra::DMatrix;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::model::belief::{RegimeId, REGIME_COUNT};
use crate::model::observation::Observation;

const STATE_DIM: usize = crate::model::belief::LatentState::DIM;

/// Linear-Gaussian dynamics for one regime.
#[derive(Debug, Clone)]
pub struct RegimeModel {
    pub id: RegimeId,
    /// Descriptive regime statistics surfaced in `RegimeBelief` entries.
    pub mean_reversion_strength: f64,
    pub volatility: f64,
    pub momentum: f64,
    /// State transition A (7x7).
    pub state_transition: DMatrix<f64>,
    /// Observation map C (7x7).
    pub observation: DMatrix<f64>,
    /// Process noise Q (7x7).
    pub process_noise: DMatrix<f64>,
    /// Observation noise R (7x7).
    pub observation_noise: DMatrix<f64>,
}

/// Versioned regime model set, loaded once at startup.
#[derive(Debug, Clone)]
pub struct RegimeModelSet {
    pub version: String,
    /// HMM regime transition matrix (4x4, rows sum to 1).
    pub hmm_transition: DMatrix<f64>,
    /// Initial regime prior (sums to 1).
    pub initial_prior: Vec<f64>,
    /// Diagonal of the initial state covariance.
    pub initial_covariance_diag: f64,
    pub regimes: Vec<RegimeModel>,
}

#[derive(Debug, Deserialize)]
struct RegimeModelFile {
    version: String,
    hmm_transition: Vec<Vec<f64>>,
    initial_prior: Vec<f64>,
    #[serde(default = "default_initial_covariance")]
    initial_covariance_diag: f64,
    #[serde(rename = "regime")]
    regimes: Vec<RegimeSpec>,
}

fn default_initial_covariance() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
struct RegimeSpec {
    id: String,
    mean_reversion_strength: f64,
    volatility: f64,
    momentum: f64,
    state_transition: Vec<Vec<f64>>,
    observation: Vec<Vec<f64>>,
    process_noise: Vec<Vec<f64>>,
    observation_noise: Vec<Vec<f64>>,
}

impl RegimeModelSet {
    /// Load and validate a model set from a TOML file.
    pub fn load(path: &Path) -> Result<RegimeModelSet, PipelineError> {
        let src = std::fs::read_to_string(path).map_err(|e| PipelineError::RegimeModel {
            path: path.display().to_string(),
            msg: format!("read failed: {e}"),
        })?;
        Self::from_toml_str(&src, &path.display().to_string())
    }

    pub fn from_toml_str(src: &str, origin: &str) -> Result<RegimeModelSet, PipelineError> {
        let file: RegimeModelFile =
            toml::from_str(src).map_err(|e| PipelineError::RegimeModel {
                path: origin.to_string(),
                msg: format!("parse failed: {e}"),
            })?;
        Self::from_file(file, origin)
    }

    fn from_file(file: RegimeModelFile, origin: &str) -> Result<RegimeModelSet, PipelineError> {
        let fail = |msg: String| PipelineError::RegimeModel {
            path: origin.to_string(),
            msg,
        };

        if file.regimes.len() != REGIME_COUNT {
            return Err(fail(format!(
                "expected {} regimes, found {}",
                REGIME_COUNT,
                file.regimes.len()
            )));
        }

        let hmm = rows_to_matrix(&file.hmm_transition, REGIME_COUNT, REGIME_COUNT)
            .map_err(|m| fail(format!("hmm_transition: {m}")))?;
        for row in 0..REGIME_COUNT {
            let sum: f64 = (0..REGIME_COUNT).map(|col| hmm[(row, col)]).sum();
            if (sum - 1.0).abs() > 1e-6 {
                return Err(fail(format!("hmm_transition row {row} sums to {sum}")));
            }
        }

        if file.initial_prior.len() != REGIME_COUNT {
            return Err(fail("initial_prior must have 4 entries".to_string()));
        }
        let prior_sum: f64 = file.initial_prior.iter().sum();
        if (prior_sum - 1.0).abs() > 1e-6 || file.initial_prior.iter().any(|p| *p < 0.0) {
            return Err(fail(format!("initial_prior is not a distribution: {prior_sum}")));
        }

        if !file.initial_covariance_diag.is_finite() || file.initial_covariance_diag <= 0.0 {
            return Err(fail("initial_covariance_diag must be positive".to_string()));
        }

        let mut regimes = Vec::with_capacity(REGIME_COUNT);
        for (index, spec) in file.regimes.into_iter().enumerate() {
            let expected = RegimeId::ALL[index];
            if spec.id != expected.label() {
                return Err(fail(format!(
                    "regime {index} must be '{}', found '{}'",
                    expected.label(),
                    spec.id
                )));
            }
            let ctx = |name: &str, msg: String| fail(format!("regime '{}' {name}: {msg}", spec.id));
            let state_transition = rows_to_matrix(&spec.state_transition, STATE_DIM, STATE_DIM)
                .map_err(|m| ctx("state_transition", m))?;
            let observation = rows_to_matrix(&spec.observation, Observation::DIM, STATE_DIM)
                .map_err(|m| ctx("observation", m))?;
            let process_noise = rows_to_matrix(&spec.process_noise, STATE_DIM, STATE_DIM)
                .map_err(|m| ctx("process_noise", m))?;
            let observation_noise =
                rows_to_matrix(&spec.observation_noise, Observation::DIM, Observation::DIM)
                    .map_err(|m| ctx("observation_noise", m))?;
            for (name, m) in [("process_noise", &process_noise), ("observation_noise", &observation_noise)] {
                if m.diagonal().iter().any(|v| *v < 0.0) {
                    return Err(ctx(name, "negative diagonal entry".to_string()));
                }
            }
            regimes.push(RegimeModel {
                id: expected,
                mean_reversion_strength: spec.mean_reversion_strength,
                volatility: spec.volatility,
                momentum: spec.momentum,
                state_transition,
                observation,
                process_noise,
                observation_noise,
            });
        }

        Ok(RegimeModelSet {
            version: file.version,
            hmm_transition: hmm,
            initial_prior: file.initial_prior,
            initial_covariance_diag: file.initial_covariance_diag,
            regimes,
        })
    }

    /// Built-in canonical four-regime set. Mirrors `config/regimes.toml` and
    /// backs tests that should not depend on the filesystem.
    pub fn canonical() -> RegimeModelSet {
        RegimeModelSet {
            version: "canonical-v1".to_string(),
            hmm_transition: DMatrix::from_row_slice(
                REGIME_COUNT,
                REGIME_COUNT,
                &[
                    0.94, 0.03, 0.02, 0.01, //
                    0.04, 0.90, 0.04, 0.02, //
                    0.05, 0.05, 0.86, 0.04, //
                    0.03, 0.04, 0.05, 0.88,
                ],
            ),
            initial_prior: vec![0.25; REGIME_COUNT],
            initial_covariance_diag: 100.0,
            regimes: vec![
                canonical_regime(
                    RegimeId::LowVolMeanReversion,
                    0.85,
                    0.012,
                    0.05,
                    [1.0, 0.92, 0.88, 0.75, 0.90, 0.97, 0.94],
                    0.10,
                    [0.05, 0.01, 0.02, 0.02, 0.005, 0.01, 0.02],
                    0.05,
                    [0.25, 1.0, 0.10, 0.08, 0.05, 0.50, 0.75],
                ),
                canonical_regime(
                    RegimeId::HighVolTrending,
                    0.10,
                    0.055,
                    0.75,
                    [1.0, 0.95, 0.92, 0.97, 0.96, 0.97, 0.95],
                    0.35,
                    [1.5, 0.05, 0.04, 0.10, 0.05, 0.02, 0.05],
                    0.10,
                    [4.0, 4.0, 0.60, 0.25, 0.20, 1.0, 1.5],
                ),
                canonical_regime(
                    RegimeId::EventDriven,
                    0.30,
                    0.090,
                    0.35,
                    [1.0, 0.90, 0.85, 0.90, 0.93, 0.96, 0.90],
                    0.25,
                    [2.5, 0.10, 0.06, 0.15, 0.08, 0.05, 0.60],
                    0.10,
                    [9.0, 6.0, 0.80, 0.40, 0.30, 2.0, 6.0],
                ),
                canonical_regime(
                    RegimeId::MacroStress,
                    0.50,
                    0.160,
                    -0.40,
                    [1.0, 0.97, 0.90, 0.60, 0.98, 0.95, 0.92],
                    0.05,
                    [6.0, 0.30, 0.10, 0.20, 0.15, 0.10, 0.40],
                    0.05,
                    [25.0, 10.0, 2.0, 0.80, 0.60, 4.0, 8.0],
                ),
            ],
        }
    }
}

/// Build one canonical regime. The transition is diagonal decay plus a
/// momentum-into-price coupling; the observation map wires price<-microprice,
/// volume<-volatility, spread<-spread, imbalance<-imbalance,
/// funding<-momentum, gas<-onchain bias, mentions<-sentiment.
#[allow(clippy::too_many_arguments)]
fn canonical_regime(
    id: RegimeId,
    mean_reversion_strength: f64,
    volatility: f64,
    momentum: f64,
    transition_diag: [f64; STATE_DIM],
    momentum_to_price: f64,
    process_diag: [f64; STATE_DIM],
    funding_gain: f64,
    noise_diag: [f64; Observation::DIM],
) -> RegimeModel {
    let mut state_transition = DMatrix::from_diagonal(&nalgebra::DVector::from_row_slice(
        &transition_diag,
    ));
    state_transition[(0, 3)] = momentum_to_price;

    let mut observation = DMatrix::zeros(Observation::DIM, STATE_DIM);
    observation[(0, 0)] = 1.0; // price <- microprice
    observation[(1, 4)] = 1.0; // volume <- volatility
    observation[(2, 1)] = 1.0; // spread <- spread
    observation[(3, 2)] = 1.0; // imbalance <- imbalance
    observation[(4, 3)] = funding_gain; // funding <- momentum
    observation[(5, 5)] = 1.0; // gas <- onchain bias
    observation[(6, 6)] = 1.0; // mentions <- sentiment

    RegimeModel {
        id,
        mean_reversion_strength,
        volatility,
        momentum,
        state_transition,
        observation,
        process_noise: DMatrix::from_diagonal(&nalgebra::DVector::from_row_slice(&process_diag)),
        observation_noise: DMatrix::from_diagonal(&nalgebra::DVector::from_row_slice(&noise_diag)),
    }
}

fn rows_to_matrix(rows: &[Vec<f64>], nrows: usize, ncols: usize) -> Result<DMatrix<f64>, String> {
    if rows.len() != nrows {
        return Err(format!("expected {nrows} rows, found {}", rows.len()));
    }
    let mut m = DMatrix::zeros(nrows, ncols);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(format!("row {i} has {} columns, expected {ncols}", row.len()));
        }
        for (j, v) in row.iter().enumerate() {
            if !v.is_finite() {
                return Err(format!("non-finite entry at ({i}, {j})"));
            }
            m[(i, j)] = *v;
        }
    }
    Ok(m)
}
