use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::model::trade::TradeOutcome;

/// Rolling evaluation window, in trades.
const WINDOW: usize = 200;

/// CVaR proxy multiplier over the window max drawdown.
const CVAR_DRAWDOWN_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanaryState {
    Disabled,
    Canary,
    Partial,
    Live,
}

impl CanaryState {
    /// Fraction of live capital that follows the pipeline in this state.
    pub fn weight(self) -> f64 {
        match self {
            CanaryState::Disabled => 0.0,
            CanaryState::Canary => 0.01,
            CanaryState::Partial => 0.10,
            CanaryState::Live => 1.0,
        }
    }

    pub fn next(self) -> Option<CanaryState> {
        match self {
            CanaryState::Disabled => Some(CanaryState::Canary),
            CanaryState::Canary => Some(CanaryState::Partial),
            CanaryState::Partial => Some(CanaryState::Live),
            CanaryState::Live => None,
        }
    }

    fn previous(self) -> Option<CanaryState> {
        match self {
            CanaryState::Disabled => None,
            CanaryState::Canary => Some(CanaryState::Disabled),
            CanaryState::Partial => Some(CanaryState::Canary),
            CanaryState::Live => Some(CanaryState::Partial),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CanaryState::Disabled => "disabled",
            CanaryState::Canary => "canary",
            CanaryState::Partial => "partial",
            CanaryState::Live => "live",
        }
    }
}

/// Promotion criteria out of one state. All must hold simultaneously.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct StageCriteria {
    pub min_trades: usize,
    pub min_win_rate: f64,
    pub max_drawdown: f64,
    pub pnl_threshold: f64,
    pub cvar_cap: f64,
}

impl Default for StageCriteria {
    fn default() -> Self {
        Self {
            min_trades: 20,
            min_win_rate: 0.55,
            max_drawdown: 0.05,
            pnl_threshold: 100.0,
            cvar_cap: 0.10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CanaryConfig {
    /// Equity base used to express the drawdown path as a fraction.
    pub capital_base: f64,
    pub disabled: StageCriteria,
    pub canary: StageCriteria,
    pub partial: StageCriteria,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            capital_base: 10_000.0,
            disabled: StageCriteria {
                min_trades: 50,
                min_win_rate: 0.52,
                max_drawdown: 0.08,
                pnl_threshold: 0.0,
                cvar_cap: 0.15,
            },
            canary: StageCriteria::default(),
            partial: StageCriteria {
                min_trades: 100,
                min_win_rate: 0.55,
                max_drawdown: 0.06,
                pnl_threshold: 500.0,
                cvar_cap: 0.12,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CanaryMetrics {
    /// Lifetime recorded trades.
    pub total_fills: u64,
    /// Trades currently inside the rolling window.
    pub window_trades: usize,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub cvar_proxy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CanaryStatus {
    pub state: CanaryState,
    pub weight: f64,
    pub metrics: CanaryMetrics,
    /// Human-readable unmet promotion requirements, largest shortfall first.
    pub unmet_requirements: Vec<String>,
    pub circuit_breaker: bool,
    pub last_transition_ms: Option<i64>,
}

/// Progressive-rollout gate for live capital exposure.
///
/// Weight only ever increases through `record_trade` promotions; the single
/// path down is an explicit operator `rollback`. One `record_trade` call is
/// one atomic read-metrics-then-maybe-promote step, so the caller only needs
/// to serialize calls per instance to rule out double promotion.
pub struct CanaryController {
    config: CanaryConfig,
    state: CanaryState,
    window: VecDeque<TradeOutcome>,
    total_fills: u64,
    circuit_breaker: bool,
    last_transition_ms: Option<i64>,
}

impl CanaryController {
    pub fn new(config: CanaryConfig) -> CanaryController {
        CanaryController {
            config,
            state: CanaryState::Disabled,
            window: VecDeque::new(),
            total_fills: 0,
            circuit_breaker: false,
            last_transition_ms: None,
        }
    }

    pub fn state(&self) -> CanaryState {
        self.state
    }

    pub fn weight(&self) -> f64 {
        self.state.weight()
    }

    /// Manual hold: promotion is suppressed while the breaker is set.
    pub fn set_circuit_breaker(&mut self, active: bool) {
        self.circuit_breaker = active;
    }

    /// Record one realized trade and auto-promote when every criterion of the
    /// current state holds at once. Returns the new state on promotion.
    pub fn record_trade(&mut self, trade: &TradeOutcome) -> Option<CanaryState> {
        self.total_fills = self.total_fills.saturating_add(1);
        self.window.push_back(trade.clone());
        while self.window.len() > WINDOW {
            let _ = self.window.pop_front();
        }

        let metrics = self.metrics();
        let Some(criteria) = self.criteria_for(self.state) else {
            return None; // live is terminal
        };
        if self.circuit_breaker {
            return None;
        }
        if !unmet_requirements(&metrics, &criteria).is_empty() {
            return None;
        }

        let next = self.state.next()?;
        tracing::info!(
            from = self.state.label(),
            to = next.label(),
            window_trades = metrics.window_trades,
            win_rate = metrics.win_rate,
            total_pnl = metrics.total_pnl,
            "Canary promotion"
        );
        self.state = next;
        self.last_transition_ms = Some(chrono::Utc::now().timestamp_millis());
        Some(next)
    }

    /// Explicit operator rollback, one state down. The controller never
    /// demotes on its own.
    pub fn rollback(&mut self, reason: &str) -> CanaryState {
        if let Some(previous) = self.state.previous() {
            tracing::warn!(
                from = self.state.label(),
                to = previous.label(),
                reason,
                "Canary rollback"
            );
            self.state = previous;
            self.last_transition_ms = Some(chrono::Utc::now().timestamp_millis());
        }
        self.state
    }

    pub fn status(&self) -> CanaryStatus {
        let metrics = self.metrics();
        let unmet = match self.criteria_for(self.state) {
            Some(criteria) => unmet_requirements(&metrics, &criteria)
                .into_iter()
                .map(|(_, text)| text)
                .collect(),
            None => Vec::new(),
        };
        CanaryStatus {
            state: self.state,
            weight: self.state.weight(),
            metrics,
            unmet_requirements: unmet,
            circuit_breaker: self.circuit_breaker,
            last_transition_ms: self.last_transition_ms,
        }
    }

    fn criteria_for(&self, state: CanaryState) -> Option<StageCriteria> {
        match state {
            CanaryState::Disabled => Some(self.config.disabled),
            CanaryState::Canary => Some(self.config.canary),
            CanaryState::Partial => Some(self.config.partial),
            CanaryState::Live => None,
        }
    }

    fn metrics(&self) -> CanaryMetrics {
        let window_trades = self.window.len();
        if window_trades == 0 {
            return CanaryMetrics {
                total_fills: self.total_fills,
                ..CanaryMetrics::default()
            };
        }

        let mut wins = 0usize;
        let mut total_pnl = 0.0;
        let mut equity = self.config.capital_base.max(f64::EPSILON);
        let mut peak = equity;
        let mut max_drawdown = 0.0f64;
        for trade in &self.window {
            if trade.is_win() {
                wins += 1;
            }
            total_pnl += trade.pnl;
            equity += trade.pnl;
            if equity > peak {
                peak = equity;
            }
            if peak > f64::EPSILON {
                max_drawdown = max_drawdown.max((peak - equity) / peak);
            }
        }

        CanaryMetrics {
            total_fills: self.total_fills,
            window_trades,
            total_pnl,
            win_rate: wins as f64 / window_trades as f64,
            max_drawdown,
            cvar_proxy: CVAR_DRAWDOWN_MULTIPLIER * max_drawdown,
        }
    }
}

/// Unmet criteria with a normalized shortfall used for ranking.
fn unmet_requirements(metrics: &CanaryMetrics, criteria: &StageCriteria) -> Vec<(f64, String)> {
    let mut unmet = Vec::new();

    if metrics.window_trades < criteria.min_trades {
        let shortfall = 1.0 - metrics.window_trades as f64 / criteria.min_trades.max(1) as f64;
        unmet.push((
            shortfall,
            format!(
                "need {} trades in window, have {}",
                criteria.min_trades, metrics.window_trades
            ),
        ));
    }
    if metrics.win_rate < criteria.min_win_rate {
        let shortfall = (criteria.min_win_rate - metrics.win_rate) / criteria.min_win_rate.max(f64::EPSILON);
        unmet.push((
            shortfall,
            format!(
                "win rate {:.1}% below required {:.1}%",
                metrics.win_rate * 100.0,
                criteria.min_win_rate * 100.0
            ),
        ));
    }
    if metrics.max_drawdown > criteria.max_drawdown {
        let shortfall = (metrics.max_drawdown - criteria.max_drawdown) / criteria.max_drawdown.max(f64::EPSILON);
        unmet.push((
            shortfall,
            format!(
                "max drawdown {:.1}% above allowed {:.1}%",
                metrics.max_drawdown * 100.0,
                criteria.max_drawdown * 100.0
            ),
        ));
    }
    if metrics.total_pnl < criteria.pnl_threshold {
        let base = criteria.pnl_threshold.abs().max(1.0);
        unmet.push((
            (criteria.pnl_threshold - metrics.total_pnl) / base,
            format!(
                "window P&L {:.2} below threshold {:.2}",
                metrics.total_pnl, criteria.pnl_threshold
            ),
        ));
    }
    if metrics.cvar_proxy > criteria.cvar_cap {
        let shortfall = (metrics.cvar_proxy - criteria.cvar_cap) / criteria.cvar_cap.max(f64::EPSILON);
        unmet.push((
            shortfall,
            format!(
                "CVaR proxy {:.1}% above cap {:.1}%",
                metrics.cvar_proxy * 100.0,
                criteria.cvar_cap * 100.0
            ),
        ));
    }

    unmet.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    unmet
}
