use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::canary::CanaryConfig;
use crate::execution_router::ExecutionConfig;
use crate::pipeline::PipelineOptions;
use crate::position_sizer::SizerConfig;
use crate::strategy_router::RouterConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub options: PipelineOptions,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub risk: SizerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub canary: CanaryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    pub symbols: Vec<String>,
    /// Versioned regime model file, loaded once at startup.
    pub regime_model_path: String,
    pub portfolio_value: f64,
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl PipelineSection {
    /// Uppercased, deduplicated symbol list preserving order.
    pub fn tradable_symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config/default.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.tradable_symbols().is_empty() {
            bail!("pipeline.symbols must name at least one symbol");
        }
        if self.pipeline.portfolio_value <= 0.0 {
            bail!("pipeline.portfolio_value must be positive");
        }
        if self.pipeline.tick_interval_ms == 0 {
            bail!("pipeline.tick_interval_ms must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_toml() {
        let toml_str = r#"
[pipeline]
symbols = ["BTCUSDT", "ETHUSDT"]
regime_model_path = "config/regimes.toml"
portfolio_value = 100000.0
tick_interval_ms = 1000

[options]
external_prior_weight = 0.05
uncertainty_scale = 50.0

[router]
reward_model = "beta"
exploration_coefficient = 0.3

[risk]
max_single_position_pct = 0.05

[canary.canary]
min_trades = 20
pnl_threshold = 100.0

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pipeline.symbols.len(), 2);
        assert!((config.risk.max_single_position_pct - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.canary.canary.min_trades, 20);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn sections_fall_back_to_defaults() {
        let toml_str = r#"
[pipeline]
symbols = ["btcusdt"]
regime_model_path = "config/regimes.toml"
portfolio_value = 50000.0
tick_interval_ms = 500

[logging]
level = "info"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!((config.risk.kelly_fraction - 0.25).abs() < f64::EPSILON);
        assert!((config.options.external_prior_weight - 0.05).abs() < f64::EPSILON);
        assert!((config.canary.partial.pnl_threshold - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tradable_symbols_dedup_and_uppercase() {
        let section = PipelineSection {
            symbols: vec![
                "btcusdt".to_string(),
                "ETHUSDT".to_string(),
                "BTCUSDT".to_string(),
                "  ".to_string(),
            ],
            regime_model_path: "config/regimes.toml".to_string(),
            portfolio_value: 1.0,
            tick_interval_ms: 1,
        };
        assert_eq!(
            section.tradable_symbols(),
            vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
        );
    }
}
