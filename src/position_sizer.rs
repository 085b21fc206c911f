use serde::{Deserialize, Serialize};

use crate::correlation;
use crate::model::portfolio::PortfolioSnapshot;
use crate::model::signal::TradeSignal;

/// Days used to annualize the (crypto, 24/7) daily-return series.
const TRADING_DAYS: f64 = 365.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SizerConfig {
    /// Daily loss that trips the emergency gate, as a fraction of portfolio value.
    pub daily_loss_limit_pct: f64,
    pub max_consecutive_losses: u32,
    /// Signals below this confidence never size.
    pub min_confidence: f64,
    /// Fractional Kelly multiplier.
    pub kelly_fraction: f64,
    pub stop_loss_pct: f64,
    /// Exposure cap per symbol, existing positions included.
    pub per_symbol_cap_pct: f64,
    /// Absolute cap on any single new position.
    pub max_single_position_pct: f64,
    /// Total portfolio exposure cap. Applied last and wins over everything.
    pub max_portfolio_exposure_pct: f64,
    /// Correlation above this starts shrinking size.
    pub correlation_threshold: f64,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit_pct: 0.03,
            max_consecutive_losses: 5,
            min_confidence: 0.55,
            kelly_fraction: 0.25,
            stop_loss_pct: 0.02,
            per_symbol_cap_pct: 0.10,
            max_single_position_pct: 0.05,
            max_portfolio_exposure_pct: 0.50,
            correlation_threshold: 0.70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
    Emergency,
}

/// Stable taxonomy for risk alerts emitted by the sizing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCode {
    DailyLossLimit,
    ConsecutiveLosses,
    LowConfidence,
    NonPositiveKelly,
    InvalidSignal,
    HighVolatility,
    CorrelationDiscount,
    PortfolioCapBinding,
    EmergencyLatched,
}

impl AlertCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DailyLossLimit => "risk.daily_loss_limit",
            Self::ConsecutiveLosses => "risk.consecutive_losses",
            Self::LowConfidence => "risk.low_confidence",
            Self::NonPositiveKelly => "risk.non_positive_kelly",
            Self::InvalidSignal => "risk.invalid_signal",
            Self::HighVolatility => "risk.high_volatility",
            Self::CorrelationDiscount => "risk.correlation_discount",
            Self::PortfolioCapBinding => "risk.portfolio_cap_binding",
            Self::EmergencyLatched => "risk.emergency_latched",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAlert {
    pub severity: AlertSeverity,
    pub code: &'static str,
    pub message: String,
}

impl RiskAlert {
    fn new(severity: AlertSeverity, code: AlertCode, message: impl Into<String>) -> RiskAlert {
        RiskAlert {
            severity,
            code: code.as_str(),
            message: message.into(),
        }
    }
}

/// Non-gating portfolio statistics reported alongside every decision.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PortfolioMetrics {
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    /// Empirical 95% value-at-risk (positive loss magnitude).
    pub var_95: f64,
    pub expected_shortfall: f64,
    /// Herfindahl index over position weights.
    pub herfindahl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SizingDecision {
    /// Final size as a fraction of portfolio value. 0 means no trade.
    pub recommended_size: f64,
    pub max_allowed_size: f64,
    /// Capital at risk assuming the stop loss fires.
    pub risk_amount: f64,
    pub alerts: Vec<RiskAlert>,
    /// Which factor drove the final number. Always populated.
    pub reasoning: String,
    pub metrics: PortfolioMetrics,
}

/// Converts a policy signal into a bounded position size.
///
/// Hard gates resolve to a no-trade decision, never an error. An emergency
/// (daily loss limit) latches the sizer shut until `reset_emergency`.
pub struct PositionSizer {
    config: SizerConfig,
    emergency_latched: bool,
}

impl PositionSizer {
    pub fn new(config: SizerConfig) -> PositionSizer {
        PositionSizer {
            config,
            emergency_latched: false,
        }
    }

    pub fn is_emergency_latched(&self) -> bool {
        self.emergency_latched
    }

    /// Operator acknowledgment that clears the emergency latch.
    pub fn reset_emergency(&mut self) {
        self.emergency_latched = false;
    }

    pub fn size_position(
        &mut self,
        symbol: &str,
        signal: &TradeSignal,
        snapshot: &PortfolioSnapshot,
    ) -> SizingDecision {
        let metrics = compute_metrics(snapshot);
        let max_allowed = self.max_allowed_size(symbol, snapshot);
        let mut alerts = Vec::new();

        if self.emergency_latched {
            alerts.push(RiskAlert::new(
                AlertSeverity::Emergency,
                AlertCode::EmergencyLatched,
                "sizing blocked until emergency reset",
            ));
            return no_trade(
                "emergency latch active; operator reset required",
                alerts,
                max_allowed,
                metrics,
            );
        }

        if !signal.is_finite() {
            alerts.push(RiskAlert::new(
                AlertSeverity::Warning,
                AlertCode::InvalidSignal,
                "signal contains non-finite fields",
            ));
            return no_trade("invalid signal resolved as no-trade", alerts, max_allowed, metrics);
        }

        let loss_floor = -self.config.daily_loss_limit_pct * snapshot.portfolio_value;
        if snapshot.daily_pnl <= loss_floor {
            self.emergency_latched = true;
            tracing::warn!(
                daily_pnl = snapshot.daily_pnl,
                loss_floor,
                "Daily loss limit breached, latching sizer"
            );
            alerts.push(RiskAlert::new(
                AlertSeverity::Emergency,
                AlertCode::DailyLossLimit,
                format!(
                    "daily P&L {:.2} breached limit {:.2}",
                    snapshot.daily_pnl, loss_floor
                ),
            ));
            return no_trade("daily loss limit breached", alerts, max_allowed, metrics);
        }

        if snapshot.consecutive_losses >= self.config.max_consecutive_losses {
            alerts.push(RiskAlert::new(
                AlertSeverity::Critical,
                AlertCode::ConsecutiveLosses,
                format!("{} consecutive losses", snapshot.consecutive_losses),
            ));
            return no_trade("consecutive-loss limit reached", alerts, max_allowed, metrics);
        }

        if signal.confidence < self.config.min_confidence {
            alerts.push(RiskAlert::new(
                AlertSeverity::Warning,
                AlertCode::LowConfidence,
                format!(
                    "confidence {:.2} below floor {:.2}",
                    signal.confidence, self.config.min_confidence
                ),
            ));
            return no_trade("signal confidence below floor", alerts, max_allowed, metrics);
        }

        let kelly = kelly_fraction(signal);
        if kelly <= 0.0 {
            alerts.push(RiskAlert::new(
                AlertSeverity::Warning,
                AlertCode::NonPositiveKelly,
                "edge does not support a position",
            ));
            return no_trade("non-positive Kelly fraction", alerts, max_allowed, metrics);
        }

        let fractional = kelly * self.config.kelly_fraction;

        let vol_multiplier = volatility_multiplier(signal.volatility);
        if signal.volatility > 0.10 {
            let severity = if signal.volatility > 0.20 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            alerts.push(RiskAlert::new(
                severity,
                AlertCode::HighVolatility,
                format!("volatility {:.3} scales size by {vol_multiplier:.1}", signal.volatility),
            ));
        }

        let max_corr = correlation::max_open_position_correlation(snapshot, symbol);
        let corr_discount = correlation_discount(max_corr, self.config.correlation_threshold);
        if corr_discount < 1.0 {
            alerts.push(RiskAlert::new(
                AlertSeverity::Warning,
                AlertCode::CorrelationDiscount,
                format!("correlation {max_corr:.2} discounts size by {corr_discount:.2}"),
            ));
        }

        let sized = fractional * vol_multiplier * corr_discount;

        // Clamp order is fixed: per-symbol cap, absolute single-position cap,
        // then the total-portfolio cap, which wins over every multiplier.
        let symbol_headroom =
            (self.config.per_symbol_cap_pct - snapshot.exposure_pct_for(symbol)).max(0.0);
        let after_symbol = sized.min(symbol_headroom);
        let after_single = after_symbol.min(self.config.max_single_position_pct);
        let portfolio_headroom =
            (self.config.max_portfolio_exposure_pct - snapshot.total_exposure_pct()).max(0.0);
        let recommended = after_single.min(portfolio_headroom).max(0.0);

        let binding = if portfolio_headroom < after_single {
            alerts.push(RiskAlert::new(
                AlertSeverity::Warning,
                AlertCode::PortfolioCapBinding,
                format!("portfolio exposure headroom {portfolio_headroom:.3}"),
            ));
            "portfolio exposure cap"
        } else if after_symbol > self.config.max_single_position_pct {
            "single-position cap"
        } else if sized > symbol_headroom {
            "per-symbol cap"
        } else if corr_discount < 1.0 {
            "correlation discount"
        } else if vol_multiplier < 1.0 {
            "volatility scaling"
        } else {
            "fractional Kelly"
        };

        let reasoning = format!(
            "kelly={kelly:.3} fractional={fractional:.3} vol_mult={vol_multiplier:.2} \
             corr_discount={corr_discount:.2} -> {recommended:.4}; bound by {binding}"
        );

        SizingDecision {
            recommended_size: recommended,
            max_allowed_size: max_allowed,
            risk_amount: recommended * snapshot.portfolio_value * self.config.stop_loss_pct,
            alerts,
            reasoning,
            metrics,
        }
    }

    fn max_allowed_size(&self, symbol: &str, snapshot: &PortfolioSnapshot) -> f64 {
        let symbol_headroom =
            (self.config.per_symbol_cap_pct - snapshot.exposure_pct_for(symbol)).max(0.0);
        let portfolio_headroom =
            (self.config.max_portfolio_exposure_pct - snapshot.total_exposure_pct()).max(0.0);
        symbol_headroom
            .min(self.config.max_single_position_pct)
            .min(portfolio_headroom)
            .max(0.0)
    }
}

fn no_trade(
    reasoning: &str,
    alerts: Vec<RiskAlert>,
    max_allowed: f64,
    metrics: PortfolioMetrics,
) -> SizingDecision {
    SizingDecision {
        recommended_size: 0.0,
        max_allowed_size: max_allowed,
        risk_amount: 0.0,
        alerts,
        reasoning: reasoning.to_string(),
        metrics,
    }
}

/// Kelly fraction f = (b*p - q)/b, clamped at zero.
fn kelly_fraction(signal: &TradeSignal) -> f64 {
    if signal.avg_loss <= 0.0 || signal.avg_win <= 0.0 {
        return 0.0;
    }
    let b = signal.avg_win / signal.avg_loss;
    let p = signal.win_probability.clamp(0.0, 1.0);
    let q = 1.0 - p;
    ((b * p - q) / b).max(0.0)
}

/// Stepped (not smooth) volatility scaling so size bands stay predictable
/// under stress: low < 2%, normal up to 10%, extreme above 10%.
fn volatility_multiplier(volatility: f64) -> f64 {
    if !volatility.is_finite() || volatility < 0.0 {
        return 0.4;
    }
    if volatility < 0.02 {
        1.2
    } else if volatility <= 0.10 {
        1.0
    } else {
        0.4
    }
}

/// Shrinks size in proportion to correlation above the threshold.
fn correlation_discount(max_corr: f64, threshold: f64) -> f64 {
    let excess = (max_corr.abs() - threshold).max(0.0);
    let span = (1.0 - threshold).max(f64::EPSILON);
    (1.0 - excess / span).clamp(0.0, 1.0)
}

fn compute_metrics(snapshot: &PortfolioSnapshot) -> PortfolioMetrics {
    let returns: Vec<f64> = snapshot.daily_returns.iter().copied().collect();
    let weights = snapshot.position_weights();
    let herfindahl = weights.iter().map(|w| w * w).sum();

    if returns.len() < 2 {
        return PortfolioMetrics {
            herfindahl,
            ..PortfolioMetrics::default()
        };
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let annualized_volatility = std_dev * TRADING_DAYS.sqrt();
    let sharpe_ratio = if std_dev > f64::EPSILON {
        mean / std_dev * TRADING_DAYS.sqrt()
    } else {
        0.0
    };

    // Max drawdown over the cumulative return path.
    let mut equity = 1.0;
    let mut peak = 1.0;
    let mut max_drawdown = 0.0f64;
    for r in &returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        if peak > f64::EPSILON {
            max_drawdown = max_drawdown.max((peak - equity) / peak);
        }
    }

    // Empirical (non-parametric) tail: 5th percentile and its left mass.
    let mut sorted = returns.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let tail_index = ((sorted.len() as f64) * 0.05).floor() as usize;
    let var_cutoff = sorted[tail_index.min(sorted.len() - 1)];
    let var_95 = (-var_cutoff).max(0.0);
    let tail = &sorted[..=tail_index.min(sorted.len() - 1)];
    let expected_shortfall = if tail.is_empty() {
        var_95
    } else {
        (-(tail.iter().sum::<f64>() / tail.len() as f64)).max(0.0)
    };

    PortfolioMetrics {
        annualized_volatility,
        sharpe_ratio,
        max_drawdown,
        var_95,
        expected_shortfall,
        herfindahl,
    }
}
