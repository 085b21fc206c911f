use serde::{Deserialize, Serialize};

use crate::model::belief::{RegimeBelief, REGIME_COUNT};

/// Context feature bag consumed by the router's linear model and by
/// strategies. Every field is optional on the wire and defaults to 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextFeatures {
    pub regime_probs: [f64; REGIME_COUNT],
    pub short_vol: f64,
    pub long_vol: f64,
    pub imbalance: f64,
    pub spread_bps: f64,
    pub option_skew: f64,
    pub risk_reversal: f64,
    pub butterfly: f64,
    pub funding_rate: f64,
    pub sentiment: f64,
    pub whale_score: f64,
}

impl ContextFeatures {
    /// Length of the dense vector fed to the contextual linear model.
    pub const DIM: usize = REGIME_COUNT + 10;

    pub fn with_belief(mut self, belief: &RegimeBelief) -> ContextFeatures {
        for (slot, entry) in self.regime_probs.iter_mut().zip(belief.regimes.iter()) {
            *slot = entry.probability;
        }
        self
    }

    /// Fixed-order dense encoding. Non-finite entries are zeroed so a bad
    /// upstream feed cannot poison the policy weights.
    pub fn to_vector(&self) -> [f64; Self::DIM] {
        let mut out = [0.0; Self::DIM];
        out[..REGIME_COUNT].copy_from_slice(&self.regime_probs);
        out[REGIME_COUNT] = self.short_vol;
        out[REGIME_COUNT + 1] = self.long_vol;
        out[REGIME_COUNT + 2] = self.imbalance;
        out[REGIME_COUNT + 3] = self.spread_bps;
        out[REGIME_COUNT + 4] = self.option_skew;
        out[REGIME_COUNT + 5] = self.risk_reversal;
        out[REGIME_COUNT + 6] = self.butterfly;
        out[REGIME_COUNT + 7] = self.funding_rate;
        out[REGIME_COUNT + 8] = self.sentiment;
        out[REGIME_COUNT + 9] = self.whale_score;
        for v in &mut out {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        out
    }
}
