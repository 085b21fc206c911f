use serde::Deserialize;

use crate::model::order::{
    ChildSchedule, ExecutionLeg, ExecutionPlan, ExecutionStyle, MarketConditions, OrderRequest,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Uncertainty at or above this halts outright.
    pub halt_uncertainty: f64,
    /// Volatility (percent) at or above this halts outright.
    pub halt_volatility_pct: f64,
    /// In thin books, halting starts at this uncertainty once volatility is high.
    pub thin_book_halt_uncertainty: f64,
    /// Spreads wider than this disqualify resting limit orders.
    pub limit_max_spread_bps: f64,
    /// Books shallower than this are treated as tier 3 regardless of label.
    pub min_depth_usd: f64,
    pub twap_slices: u32,
    pub twap_interval_ms: u64,
    pub vwap_slices: u32,
    pub vwap_interval_ms: u64,
    pub iceberg_slices: u32,
    pub iceberg_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            halt_uncertainty: 0.85,
            halt_volatility_pct: 20.0,
            thin_book_halt_uncertainty: 0.60,
            limit_max_spread_bps: 10.0,
            min_depth_usd: 1_000.0,
            twap_slices: 6,
            twap_interval_ms: 10_000,
            vwap_slices: 8,
            vwap_interval_ms: 7_500,
            iceberg_slices: 10,
            iceberg_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UncertaintyBucket {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolatilityBucket {
    Low,
    Moderate,
    High,
}

/// Chooses an execution style from a fixed, auditable lookup table keyed by
/// (uncertainty bucket x liquidity tier x volatility bucket). Deliberately
/// not a learned model: identical inputs always produce identical plans, and
/// breached circuit breakers return `halt` rather than a smaller size.
pub struct ExecutionRouter {
    config: ExecutionConfig,
}

impl ExecutionRouter {
    pub fn new(config: ExecutionConfig) -> ExecutionRouter {
        ExecutionRouter { config }
    }

    pub fn route_order(
        &self,
        order: &OrderRequest,
        market: &MarketConditions,
        uncertainty: f64,
    ) -> ExecutionPlan {
        let uncertainty = if uncertainty.is_finite() {
            uncertainty.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let volatility = if market.volatility_pct.is_finite() {
            market.volatility_pct.max(0.0)
        } else {
            self.config.halt_volatility_pct
        };
        let tier = effective_tier(market, self.config.min_depth_usd);

        // Circuit breakers: refusal, never a discount.
        let breaker = uncertainty >= self.config.halt_uncertainty
            || volatility >= self.config.halt_volatility_pct
            || (tier == 3
                && uncertainty >= self.config.thin_book_halt_uncertainty
                && volatility >= 10.0);
        if breaker {
            tracing::warn!(
                symbol = %order.symbol,
                uncertainty,
                volatility_pct = volatility,
                tier,
                "Execution circuit breaker tripped, halting"
            );
            return ExecutionPlan {
                primary: ExecutionLeg {
                    style: ExecutionStyle::Halt,
                    schedule: None,
                },
                fallback: None,
            };
        }

        let u_bucket = if uncertainty < 0.30 {
            UncertaintyBucket::Low
        } else if uncertainty < 0.60 {
            UncertaintyBucket::Moderate
        } else {
            UncertaintyBucket::High
        };
        let v_bucket = if volatility < 2.0 {
            VolatilityBucket::Low
        } else if volatility < 8.0 {
            VolatilityBucket::Moderate
        } else {
            VolatilityBucket::High
        };

        use ExecutionStyle::*;
        use UncertaintyBucket as U;
        use VolatilityBucket as V;
        let mut style = match (u_bucket, tier, v_bucket) {
            // Calm filter, deep book: rest at the touch.
            (U::Low, 1, V::Low) => Limit,
            (U::Low, 1, V::Moderate) => Limit,
            (U::Low, 2, V::Low) => Limit,
            // Calm but imperfect conditions: schedule the flow.
            (U::Low, 1, V::High) => Twap,
            (U::Low, 2, V::Moderate) => Twap,
            (U::Low, 2, V::High) => Vwap,
            (U::Low, 3, V::Low) => Twap,
            (U::Low, 3, V::Moderate) => Vwap,
            (U::Low, 3, V::High) => Iceberg,
            // Moderate uncertainty: never rest naked limits.
            (U::Moderate, 1, V::Low) => Twap,
            (U::Moderate, 1, V::Moderate) => Twap,
            (U::Moderate, 1, V::High) => Vwap,
            (U::Moderate, 2, V::Low) => Twap,
            (U::Moderate, 2, V::Moderate) => Vwap,
            (U::Moderate, 2, V::High) => Vwap,
            (U::Moderate, 3, V::Low) => Vwap,
            (U::Moderate, 3, V::Moderate) => Iceberg,
            (U::Moderate, 3, V::High) => Iceberg,
            // High uncertainty short of the breaker: hide intent.
            (U::High, 1, _) => Vwap,
            (U::High, _, _) => Iceberg,
            // Tiers are clamped to 1..=3 above; nothing else is reachable.
            (_, _, _) => Twap,
        };

        if style == Limit && market.spread_bps > self.config.limit_max_spread_bps {
            style = Twap;
        }

        let primary = self.leg(style);
        let fallback = match style {
            Limit => Some(self.leg(Twap)),
            Twap => Some(self.leg(Vwap)),
            _ => None,
        };
        ExecutionPlan { primary, fallback }
    }

    fn leg(&self, style: ExecutionStyle) -> ExecutionLeg {
        let schedule = match style {
            ExecutionStyle::Twap => Some(ChildSchedule {
                slices: self.config.twap_slices.max(1),
                interval_ms: self.config.twap_interval_ms.max(1),
            }),
            ExecutionStyle::Vwap => Some(ChildSchedule {
                slices: self.config.vwap_slices.max(1),
                interval_ms: self.config.vwap_interval_ms.max(1),
            }),
            ExecutionStyle::Iceberg => Some(ChildSchedule {
                slices: self.config.iceberg_slices.max(1),
                interval_ms: self.config.iceberg_interval_ms.max(1),
            }),
            ExecutionStyle::Limit | ExecutionStyle::Halt => None,
        };
        ExecutionLeg { style, schedule }
    }
}

fn effective_tier(market: &MarketConditions, min_depth_usd: f64) -> u8 {
    let tier = market.liquidity_tier.clamp(1, 3);
    if market.depth_usd.is_finite() && market.depth_usd < min_depth_usd {
        3
    } else {
        tier
    }
}
