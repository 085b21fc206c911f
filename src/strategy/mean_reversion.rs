use crate::model::belief::{LatentState, RegimeBelief, RegimeId};
use crate::model::features::ContextFeatures;
use crate::model::signal::{Direction, TradeSignal};
use crate::strategy::Strategy;

/// Fades order-book stretch while the calm mean-reversion regime holds.
#[derive(Debug)]
pub struct MeanReversionStrategy {
    min_reversion_prob: f64,
    imbalance_stretch: f64,
    max_volatility: f64,
}

impl MeanReversionStrategy {
    pub fn new() -> Self {
        Self {
            min_reversion_prob: 0.50,
            imbalance_stretch: 0.35,
            max_volatility: 0.05,
        }
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MeanReversionStrategy {
    fn id(&self) -> &'static str {
        "mean_reversion"
    }

    fn decide(
        &self,
        state: &LatentState,
        belief: &RegimeBelief,
        features: &ContextFeatures,
    ) -> TradeSignal {
        let reversion_prob = belief.probability_of(RegimeId::LowVolMeanReversion);
        if reversion_prob < self.min_reversion_prob {
            return TradeSignal::flat();
        }
        if features.short_vol.abs() > self.max_volatility {
            return TradeSignal::flat();
        }
        let stretch = if state.imbalance.is_finite() {
            state.imbalance
        } else {
            0.0
        };
        if stretch.abs() < self.imbalance_stretch {
            return TradeSignal::flat();
        }

        // Stretched toward the bid gets sold, stretched toward the ask bought.
        let direction = if stretch > 0.0 {
            Direction::Short
        } else {
            Direction::Long
        };
        let strength = belief
            .regimes
            .iter()
            .find(|r| r.id == RegimeId::LowVolMeanReversion)
            .map(|r| r.mean_reversion_strength)
            .unwrap_or(0.5);
        let wide_spread_penalty = (features.spread_bps / 100.0).clamp(0.0, 0.3);
        let confidence = (reversion_prob * (0.5 + 0.5 * stretch.abs().min(1.0)) * strength
            - wide_spread_penalty)
            .clamp(0.0, 0.9);

        TradeSignal {
            direction,
            confidence,
            expected_return: stretch.abs().min(1.0) * 0.012,
            win_probability: (0.52 + 0.10 * reversion_prob).min(0.65),
            avg_win: 0.012,
            avg_loss: 0.010,
            volatility: features.short_vol.abs(),
        }
    }
}
