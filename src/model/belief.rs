use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Number of regimes tracked by the detector.
pub const REGIME_COUNT: usize = 4;

/// Discrete latent market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegimeId {
    LowVolMeanReversion,
    HighVolTrending,
    EventDriven,
    MacroStress,
}

impl RegimeId {
    pub const ALL: [RegimeId; REGIME_COUNT] = [
        RegimeId::LowVolMeanReversion,
        RegimeId::HighVolTrending,
        RegimeId::EventDriven,
        RegimeId::MacroStress,
    ];

    pub fn index(self) -> usize {
        match self {
            RegimeId::LowVolMeanReversion => 0,
            RegimeId::HighVolTrending => 1,
            RegimeId::EventDriven => 2,
            RegimeId::MacroStress => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<RegimeId> {
        RegimeId::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            RegimeId::LowVolMeanReversion => "low_vol_mean_reversion",
            RegimeId::HighVolTrending => "high_vol_trending",
            RegimeId::EventDriven => "event_driven",
            RegimeId::MacroStress => "macro_stress",
        }
    }
}

/// Filtered latent market state. Mutated only by the regime detector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatentState {
    pub microprice: f64,
    pub spread: f64,
    pub imbalance: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub onchain_bias: f64,
    pub sentiment: f64,
}

impl LatentState {
    pub const DIM: usize = 7;

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_vec(vec![
            self.microprice,
            self.spread,
            self.imbalance,
            self.momentum,
            self.volatility,
            self.onchain_bias,
            self.sentiment,
        ])
    }

    pub fn from_vector(v: &DVector<f64>) -> LatentState {
        LatentState {
            microprice: v[0],
            spread: v[1],
            imbalance: v[2],
            momentum: v[3],
            volatility: v[4],
            onchain_bias: v[5],
            sentiment: v[6],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeEntry {
    pub id: RegimeId,
    pub probability: f64,
    pub mean_reversion_strength: f64,
    pub volatility: f64,
    pub momentum: f64,
}

/// Posterior over regimes. Probabilities sum to 1 within 1e-6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeBelief {
    pub regimes: Vec<RegimeEntry>,
}

impl RegimeBelief {
    pub fn uniform() -> RegimeBelief {
        let p = 1.0 / REGIME_COUNT as f64;
        RegimeBelief {
            regimes: RegimeId::ALL
                .iter()
                .map(|&id| RegimeEntry {
                    id,
                    probability: p,
                    mean_reversion_strength: 0.0,
                    volatility: 0.0,
                    momentum: 0.0,
                })
                .collect(),
        }
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.regimes.iter().map(|r| r.probability).collect()
    }

    pub fn probability_of(&self, id: RegimeId) -> f64 {
        self.regimes
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.probability)
            .unwrap_or(0.0)
    }

    /// Regime with the highest posterior probability.
    pub fn dominant(&self) -> RegimeId {
        self.regimes
            .iter()
            .max_by(|a, b| {
                a.probability
                    .partial_cmp(&b.probability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|r| r.id)
            .unwrap_or(RegimeId::LowVolMeanReversion)
    }

    pub fn is_normalized(&self) -> bool {
        let sum: f64 = self.regimes.iter().map(|r| r.probability).sum();
        (sum - 1.0).abs() <= 1e-6
            && self
                .regimes
                .iter()
                .all(|r| (0.0..=1.0).contains(&r.probability))
    }
}
