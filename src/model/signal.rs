use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Flat,
}

/// Qualitative trade signal emitted by a strategy, consumed by the sizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub direction: Direction,
    /// Strategy's own confidence in [0, 1].
    pub confidence: f64,
    pub expected_return: f64,
    pub win_probability: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub volatility: f64,
}

impl TradeSignal {
    pub fn flat() -> TradeSignal {
        TradeSignal {
            direction: Direction::Flat,
            confidence: 0.0,
            expected_return: 0.0,
            win_probability: 0.5,
            avg_win: 0.0,
            avg_loss: 0.0,
            volatility: 0.0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::Flat
    }

    pub fn is_finite(&self) -> bool {
        [
            self.confidence,
            self.expected_return,
            self.win_probability,
            self.avg_win,
            self.avg_loss,
            self.volatility,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
