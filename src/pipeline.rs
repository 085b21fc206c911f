use serde::Deserialize;

use crate::canary::{CanaryConfig, CanaryController, CanaryState, CanaryStatus};
use crate::error::PipelineError;
use crate::execution_router::{ExecutionConfig, ExecutionRouter};
use crate::model::features::ContextFeatures;
use crate::model::observation::Observation;
use crate::model::order::{ExecutionPlan, MarketConditions, OrderKind, OrderRequest, OrderSide};
use crate::model::portfolio::PortfolioSnapshot;
use crate::model::signal::{Direction, TradeSignal};
use crate::model::trade::TradeOutcome;
use crate::position_sizer::{PositionSizer, SizerConfig, SizingDecision};
use crate::regime::{RegimeEstimate, RegimeFilter, RegimeModelSet};
use crate::strategy::PolicyCatalog;
use crate::strategy_router::{RouterChoice, RouterConfig, StrategyRouter};

/// Everything the pipeline decided for one tick.
#[derive(Debug, Clone)]
pub struct TickDecision {
    pub decision_id: String,
    pub symbol: String,
    pub estimate: RegimeEstimate,
    /// Detector uncertainty squashed into [0, 1] for the execution router.
    pub uncertainty_score: f64,
    pub choice: RouterChoice,
    pub signal: TradeSignal,
    pub sizing: SizingDecision,
    /// Recommended size after the canary weight is applied.
    pub deployable_size: f64,
    pub plan: Option<ExecutionPlan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Blend weight for an external regime prior, capped at 0.10 downstream.
    pub external_prior_weight: f64,
    /// Covariance-trace scale mapping detector uncertainty into [0, 1].
    pub uncertainty_scale: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            external_prior_weight: 0.05,
            uncertainty_scale: 50.0,
        }
    }
}

/// One explicitly owned pipeline instance per traded symbol.
///
/// Instances share no mutable state; callers that deliver ticks from
/// concurrent sources must serialize calls per instance (one mutex around a
/// full invocation), never across symbols.
pub struct SymbolPipeline {
    symbol: String,
    filter: RegimeFilter,
    catalog: PolicyCatalog,
    router: StrategyRouter,
    sizer: PositionSizer,
    execution: ExecutionRouter,
    canary: CanaryController,
    uncertainty_scale: f64,
}

impl std::fmt::Debug for SymbolPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolPipeline")
            .field("symbol", &self.symbol)
            .field("uncertainty_scale", &self.uncertainty_scale)
            .finish_non_exhaustive()
    }
}

impl SymbolPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        models: RegimeModelSet,
        catalog: PolicyCatalog,
        options: PipelineOptions,
        router_config: RouterConfig,
        sizer_config: SizerConfig,
        execution_config: ExecutionConfig,
        canary_config: CanaryConfig,
    ) -> Result<SymbolPipeline, PipelineError> {
        if catalog.is_empty() {
            return Err(PipelineError::EmptyCatalog);
        }
        let router = StrategyRouter::new(router_config, catalog.ids());
        Ok(SymbolPipeline {
            symbol: symbol.into(),
            filter: RegimeFilter::new(models, options.external_prior_weight),
            catalog,
            router,
            sizer: PositionSizer::new(sizer_config),
            execution: ExecutionRouter::new(execution_config),
            canary: CanaryController::new(canary_config),
            uncertainty_scale: options.uncertainty_scale.max(f64::EPSILON),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Run one full filter -> choose -> size -> route pass.
    pub fn on_tick(
        &mut self,
        observation: &Observation,
        features: ContextFeatures,
        market: &MarketConditions,
        snapshot: &PortfolioSnapshot,
        external_prior: Option<&[f64]>,
    ) -> Result<TickDecision, PipelineError> {
        let estimate = self.filter.step(observation, external_prior);
        let features = features.with_belief(&estimate.belief);

        let choice = self.router.choose(&features)?;
        let signal = self
            .catalog
            .decide(&choice.policy_id, &estimate.state, &estimate.belief, &features)?;

        let sizing = self.sizer.size_position(&self.symbol, &signal, snapshot);
        let uncertainty_score =
            estimate.uncertainty / (estimate.uncertainty + self.uncertainty_scale);

        let plan = if sizing.recommended_size > 0.0 && signal.is_actionable() {
            let order = OrderRequest {
                symbol: self.symbol.clone(),
                side: match signal.direction {
                    Direction::Short => OrderSide::Sell,
                    _ => OrderSide::Buy,
                },
                size_pct: sizing.recommended_size,
                kind: OrderKind::Market,
            };
            Some(self.execution.route_order(&order, market, uncertainty_score))
        } else {
            None
        };

        let deployable_size = sizing.recommended_size * self.canary.weight();
        tracing::debug!(
            symbol = %self.symbol,
            policy = %choice.policy_id,
            regime = estimate.belief.dominant().label(),
            recommended = sizing.recommended_size,
            deployable = deployable_size,
            "Tick decision"
        );

        Ok(TickDecision {
            decision_id: uuid::Uuid::new_v4().to_string(),
            symbol: self.symbol.clone(),
            estimate,
            uncertainty_score,
            choice,
            signal,
            sizing,
            deployable_size,
            plan,
        })
    }

    /// Feed one realized outcome back into the router posterior and the
    /// canary window. `features` is the context captured at entry time.
    pub fn on_trade(
        &mut self,
        trade: &TradeOutcome,
        features: &ContextFeatures,
    ) -> Result<Option<CanaryState>, PipelineError> {
        self.router.update(&trade.policy_id, trade.pnl, features)?;
        Ok(self.canary.record_trade(trade))
    }

    pub fn canary_status(&self) -> CanaryStatus {
        self.canary.status()
    }

    pub fn canary_weight(&self) -> f64 {
        self.canary.weight()
    }

    pub fn rollback_canary(&mut self, reason: &str) -> CanaryState {
        self.canary.rollback(reason)
    }

    pub fn set_circuit_breaker(&mut self, active: bool) {
        self.canary.set_circuit_breaker(active);
    }

    pub fn is_emergency_latched(&self) -> bool {
        self.sizer.is_emergency_latched()
    }

    pub fn reset_emergency(&mut self) {
        self.sizer.reset_emergency();
    }
}
