use crate::model::belief::{LatentState, RegimeBelief, RegimeId};
use crate::model::features::ContextFeatures;
use crate::model::signal::{Direction, TradeSignal};
use crate::strategy::Strategy;

/// Rides filtered momentum when the trending regime dominates.
#[derive(Debug)]
pub struct MomentumBreakoutStrategy {
    min_trend_prob: f64,
    momentum_threshold: f64,
    base_avg_win: f64,
    base_avg_loss: f64,
}

impl MomentumBreakoutStrategy {
    pub fn new() -> Self {
        Self {
            min_trend_prob: 0.45,
            momentum_threshold: 0.15,
            base_avg_win: 0.030,
            base_avg_loss: 0.018,
        }
    }
}

impl Default for MomentumBreakoutStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MomentumBreakoutStrategy {
    fn id(&self) -> &'static str {
        "momentum_breakout"
    }

    fn decide(
        &self,
        state: &LatentState,
        belief: &RegimeBelief,
        features: &ContextFeatures,
    ) -> TradeSignal {
        let trend_prob = belief.probability_of(RegimeId::HighVolTrending);
        if trend_prob < self.min_trend_prob || !state.momentum.is_finite() {
            return TradeSignal::flat();
        }
        if state.momentum.abs() < self.momentum_threshold {
            return TradeSignal::flat();
        }

        let direction = if state.momentum > 0.0 {
            Direction::Long
        } else {
            Direction::Short
        };
        // Funding leaning against the move is a crowding warning.
        let crowding = (features.funding_rate * state.momentum.signum()).max(0.0);
        let confidence =
            (trend_prob * (0.6 + state.momentum.abs().min(1.0) * 0.4) - crowding).clamp(0.0, 0.95);

        TradeSignal {
            direction,
            confidence,
            expected_return: state.momentum.abs().min(1.0) * self.base_avg_win,
            win_probability: (0.50 + 0.15 * trend_prob).min(0.70),
            avg_win: self.base_avg_win,
            avg_loss: self.base_avg_loss,
            volatility: features.short_vol.max(features.long_vol).abs(),
        }
    }
}
