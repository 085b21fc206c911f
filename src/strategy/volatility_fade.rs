use crate::model::belief::{LatentState, RegimeBelief, RegimeId};
use crate::model::features::ContextFeatures;
use crate::model::signal::{Direction, TradeSignal};
use crate::strategy::Strategy;

/// Fades sentiment spikes around event-driven regimes, standing down
/// entirely under macro stress.
#[derive(Debug)]
pub struct VolatilityFadeStrategy {
    min_event_prob: f64,
    max_stress_prob: f64,
    sentiment_spike: f64,
}

impl VolatilityFadeStrategy {
    pub fn new() -> Self {
        Self {
            min_event_prob: 0.35,
            max_stress_prob: 0.20,
            sentiment_spike: 0.60,
        }
    }
}

impl Default for VolatilityFadeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for VolatilityFadeStrategy {
    fn id(&self) -> &'static str {
        "volatility_fade"
    }

    fn decide(
        &self,
        state: &LatentState,
        belief: &RegimeBelief,
        features: &ContextFeatures,
    ) -> TradeSignal {
        if belief.probability_of(RegimeId::MacroStress) > self.max_stress_prob {
            return TradeSignal::flat();
        }
        let event_prob = belief.probability_of(RegimeId::EventDriven);
        if event_prob < self.min_event_prob {
            return TradeSignal::flat();
        }

        // External sentiment score is already normalized; the latent momentum
        // sign tells us which way the crowd is leaning.
        let whale_push = features.whale_score.clamp(-1.0, 1.0);
        let mut spike = features.sentiment + 0.3 * whale_push;
        if spike == 0.0 && state.momentum.is_finite() {
            spike = state.momentum.clamp(-1.5, 1.5);
        }
        if spike.abs() < self.sentiment_spike {
            return TradeSignal::flat();
        }

        let direction = if spike > 0.0 {
            Direction::Short
        } else {
            Direction::Long
        };
        let confidence = (event_prob * spike.abs().min(1.5) * 0.6).clamp(0.0, 0.85);

        TradeSignal {
            direction,
            confidence,
            expected_return: spike.abs().min(1.5) * 0.015,
            win_probability: (0.50 + 0.12 * event_prob).min(0.64),
            avg_win: 0.022,
            avg_loss: 0.016,
            volatility: features.short_vol.max(features.long_vol).abs(),
        }
    }
}
