use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::model::belief::{LatentState, RegimeBelief};
use crate::model::features::ContextFeatures;
use crate::model::signal::TradeSignal;

pub mod mean_reversion;
pub mod momentum_breakout;
pub mod volatility_fade;

pub use mean_reversion::MeanReversionStrategy;
pub use momentum_breakout::MomentumBreakoutStrategy;
pub use volatility_fade::VolatilityFadeStrategy;

/// Capability contract every routed policy satisfies. Implementations are
/// independent variant types; decisions are pure with respect to the inputs.
pub trait Strategy: Send {
    fn id(&self) -> &'static str;

    fn decide(
        &self,
        state: &LatentState,
        belief: &RegimeBelief,
        features: &ContextFeatures,
    ) -> TradeSignal;
}

/// Fixed policy catalog built once at startup.
pub struct PolicyCatalog {
    policies: BTreeMap<String, Box<dyn Strategy>>,
}

impl PolicyCatalog {
    pub fn new() -> PolicyCatalog {
        PolicyCatalog {
            policies: BTreeMap::new(),
        }
    }

    /// Reference catalog exercising the router end to end. Production
    /// deployments register their own strategies instead.
    pub fn reference() -> PolicyCatalog {
        let mut catalog = PolicyCatalog::new();
        catalog.register(Box::new(MomentumBreakoutStrategy::new()));
        catalog.register(Box::new(MeanReversionStrategy::new()));
        catalog.register(Box::new(VolatilityFadeStrategy::new()));
        catalog
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        self.policies.insert(strategy.id().to_string(), strategy);
    }

    pub fn ids(&self) -> Vec<String> {
        self.policies.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn decide(
        &self,
        policy_id: &str,
        state: &LatentState,
        belief: &RegimeBelief,
        features: &ContextFeatures,
    ) -> Result<TradeSignal, PipelineError> {
        let strategy = self
            .policies
            .get(policy_id)
            .ok_or_else(|| PipelineError::UnknownPolicy(policy_id.to_string()))?;
        Ok(strategy.decide(state, belief, features))
    }
}

impl Default for PolicyCatalog {
    fn default() -> Self {
        Self::reference()
    }
}
