use serde::{Deserialize, Serialize};

/// Realized trade outcome reported by the external fill subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub trade_id: String,
    pub symbol: String,
    /// Policy that produced the entry signal.
    pub policy_id: String,
    pub pnl: f64,
    pub entry_ms: u64,
    pub exit_ms: u64,
}

impl TradeOutcome {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn holding_ms(&self) -> u64 {
        self.exit_ms.saturating_sub(self.entry_ms)
    }
}
