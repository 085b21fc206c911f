use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::model::signal::Direction;

/// Retained daily-return samples, per portfolio and per symbol.
const RETURN_WINDOW: usize = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub side: Direction,
    /// Position size as a fraction of portfolio value.
    pub size_pct: f64,
    pub entry_price: f64,
    pub current_price: f64,
}

impl OpenPosition {
    pub fn unrealized_return(&self) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        let raw = (self.current_price - self.entry_price) / self.entry_price;
        match self.side {
            Direction::Short => -raw,
            _ => raw,
        }
    }
}

/// Portfolio view read by the sizer. Positions are created on fill, mutated
/// on price update, and removed on close by the external fill reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub portfolio_value: f64,
    pub daily_pnl: f64,
    pub consecutive_losses: u32,
    pub positions: HashMap<String, OpenPosition>,
    /// Daily portfolio returns, oldest first.
    pub daily_returns: VecDeque<f64>,
    /// Per-symbol daily returns feeding the correlation estimator.
    pub symbol_returns: HashMap<String, VecDeque<f64>>,
}

impl PortfolioSnapshot {
    pub fn new(portfolio_value: f64) -> PortfolioSnapshot {
        PortfolioSnapshot {
            portfolio_value,
            daily_pnl: 0.0,
            consecutive_losses: 0,
            positions: HashMap::new(),
            daily_returns: VecDeque::new(),
            symbol_returns: HashMap::new(),
        }
    }

    /// Sum of open position sizes as a fraction of portfolio value.
    pub fn total_exposure_pct(&self) -> f64 {
        self.positions.values().map(|p| p.size_pct.abs()).sum()
    }

    pub fn exposure_pct_for(&self, symbol: &str) -> f64 {
        self.positions
            .get(symbol)
            .map(|p| p.size_pct.abs())
            .unwrap_or(0.0)
    }

    /// Position weights normalized over total exposure, for concentration math.
    pub fn position_weights(&self) -> Vec<f64> {
        let total = self.total_exposure_pct();
        if total <= f64::EPSILON {
            return Vec::new();
        }
        self.positions
            .values()
            .map(|p| p.size_pct.abs() / total)
            .collect()
    }

    pub fn on_fill(&mut self, symbol: &str, side: Direction, size_pct: f64, price: f64) {
        self.positions.insert(
            symbol.to_string(),
            OpenPosition {
                symbol: symbol.to_string(),
                side,
                size_pct,
                entry_price: price,
                current_price: price,
            },
        );
    }

    pub fn update_price(&mut self, symbol: &str, price: f64) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.current_price = price;
        }
    }

    pub fn close_position(&mut self, symbol: &str, realized_pnl: f64) -> Option<OpenPosition> {
        self.daily_pnl += realized_pnl;
        if realized_pnl < 0.0 {
            self.consecutive_losses = self.consecutive_losses.saturating_add(1);
        } else if realized_pnl > 0.0 {
            self.consecutive_losses = 0;
        }
        self.positions.remove(symbol)
    }

    pub fn record_daily_return(&mut self, ret: f64) {
        if !ret.is_finite() {
            return;
        }
        self.daily_returns.push_back(ret);
        while self.daily_returns.len() > RETURN_WINDOW {
            let _ = self.daily_returns.pop_front();
        }
    }

    pub fn record_symbol_return(&mut self, symbol: &str, ret: f64) {
        if !ret.is_finite() {
            return;
        }
        let series = self.symbol_returns.entry(symbol.to_string()).or_default();
        series.push_back(ret);
        while series.len() > RETURN_WINDOW {
            let _ = series.pop_front();
        }
    }
}
