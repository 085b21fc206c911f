use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Raw per-tick market observation. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub price: f64,
    pub volume: f64,
    pub spread: f64,
    /// Order-book imbalance in [-1, 1]; positive means bid-heavy.
    pub imbalance: f64,
    pub funding_rate: f64,
    pub gas_price: f64,
    pub social_mentions: f64,
}

impl Observation {
    pub const DIM: usize = 7;

    pub fn is_finite(&self) -> bool {
        [
            self.price,
            self.volume,
            self.spread,
            self.imbalance,
            self.funding_rate,
            self.gas_price,
            self.social_mentions,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_vec(vec![
            self.price,
            self.volume,
            self.spread,
            self.imbalance,
            self.funding_rate,
            self.gas_price,
            self.social_mentions,
        ])
    }
}
