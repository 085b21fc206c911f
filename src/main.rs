use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use decision_quant::config::Config;
use decision_quant::model::features::ContextFeatures;
use decision_quant::model::observation::Observation;
use decision_quant::model::order::MarketConditions;
use decision_quant::model::portfolio::PortfolioSnapshot;
use decision_quant::model::trade::TradeOutcome;
use decision_quant::pipeline::SymbolPipeline;
use decision_quant::regime::RegimeModelSet;
use decision_quant::runtime::{PipelineWorkerRegistry, TickEvent};
use decision_quant::strategy::PolicyCatalog;

const WORKER_QUEUE_DEPTH: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.logging.level);

    let models = RegimeModelSet::load(Path::new(&config.pipeline.regime_model_path))
        .context("failed to load regime models")?;
    tracing::info!(version = %models.version, "Regime models loaded");

    let symbols = config.pipeline.tradable_symbols();
    let mut registry = PipelineWorkerRegistry::default();
    let mut workers = Vec::new();

    for symbol in &symbols {
        let pipeline = SymbolPipeline::new(
            symbol.clone(),
            models.clone(),
            PolicyCatalog::reference(),
            config.options.clone(),
            config.router.clone(),
            config.risk.clone(),
            config.execution.clone(),
            config.canary.clone(),
        )
        .with_context(|| format!("failed to build pipeline for {symbol}"))?;

        let (tick_tx, tick_rx) = mpsc::channel::<TickEvent>(WORKER_QUEUE_DEPTH);
        registry.register(format!("pipeline-{symbol}"), symbol.clone(), tick_tx);
        workers.push(tokio::spawn(run_pipeline_worker(
            pipeline,
            tick_rx,
            config.pipeline.portfolio_value,
        )));
    }
    tracing::info!(symbols = symbols.len(), "Pipelines started");

    let feed = tokio::spawn(run_synthetic_feed(
        registry,
        symbols.clone(),
        config.pipeline.tick_interval_ms,
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    feed.abort();
    for worker in workers {
        worker.abort();
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Paper-run worker: drives one pipeline instance off its tick queue and
/// simulates immediate fills so router and canary learning are exercised.
async fn run_pipeline_worker(
    mut pipeline: SymbolPipeline,
    mut tick_rx: mpsc::Receiver<TickEvent>,
    portfolio_value: f64,
) {
    let symbol = pipeline.symbol().to_string();
    let mut snapshot = PortfolioSnapshot::new(portfolio_value);
    let mut rng = StdRng::from_entropy();
    let mut ticks: u64 = 0;

    while let Some(event) = tick_rx.recv().await {
        ticks += 1;
        let decision = match pipeline.on_tick(
            &event.observation,
            event.features,
            &event.market,
            &snapshot,
            event.external_prior.as_deref(),
        ) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "Pipeline tick failed");
                continue;
            }
        };

        if let Some(plan) = &decision.plan {
            tracing::info!(
                symbol = %symbol,
                policy = %decision.choice.policy_id,
                size = decision.deployable_size,
                style = %plan.primary.style,
                "Order routed"
            );
            // Paper fill: settle the trade immediately with noise around the
            // signal's expectancy.
            let edge = decision.signal.expected_return * decision.signal.confidence;
            let noise: f64 = rng.gen_range(-1.5..1.5) * decision.signal.avg_loss;
            let pnl = (edge + noise) * portfolio_value * decision.sizing.recommended_size;
            let trade = TradeOutcome {
                trade_id: decision.decision_id.clone(),
                symbol: symbol.clone(),
                policy_id: decision.choice.policy_id.clone(),
                pnl,
                entry_ms: ticks,
                exit_ms: ticks + 1,
            };
            snapshot.close_position(&symbol, pnl);
            match pipeline.on_trade(&trade, &event.features) {
                Ok(Some(state)) => {
                    tracing::info!(symbol = %symbol, state = state.label(), "Canary promoted")
                }
                Ok(None) => {}
                Err(e) => tracing::error!(symbol = %symbol, error = %e, "Trade feedback failed"),
            }
        }

        if ticks % 100 == 0 {
            let status = pipeline.canary_status();
            // JSON status is the line the operational surface scrapes.
            match serde_json::to_string(&status) {
                Ok(json) => tracing::info!(symbol = %symbol, status = %json, "Canary status"),
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Failed to encode canary status")
                }
            }
        }
    }
}

/// Random-walk market data generator standing in for the excluded
/// market-data connectors.
async fn run_synthetic_feed(
    registry: PipelineWorkerRegistry,
    symbols: Vec<String>,
    tick_interval_ms: u64,
) {
    let mut rng = StdRng::from_entropy();
    let mut prices: Vec<f64> = symbols.iter().map(|_| rng.gen_range(90.0..110.0)).collect();
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(tick_interval_ms));

    loop {
        interval.tick().await;
        for (symbol, price) in symbols.iter().zip(prices.iter_mut()) {
            let drift: f64 = rng.gen_range(-0.5..0.5);
            *price = (*price + drift).max(1.0);
            let spread = rng.gen_range(0.01..0.20);
            let event = TickEvent {
                observation: Observation {
                    price: *price,
                    volume: rng.gen_range(1.0..50.0),
                    spread,
                    imbalance: rng.gen_range(-0.8..0.8),
                    funding_rate: rng.gen_range(-0.0005..0.0005),
                    gas_price: rng.gen_range(10.0..60.0),
                    social_mentions: rng.gen_range(0.0..20.0),
                },
                features: ContextFeatures {
                    short_vol: rng.gen_range(0.005..0.08),
                    long_vol: rng.gen_range(0.01..0.06),
                    spread_bps: spread / *price * 10_000.0,
                    ..ContextFeatures::default()
                },
                market: MarketConditions {
                    spread_bps: spread / *price * 10_000.0,
                    depth_usd: rng.gen_range(5_000.0..500_000.0),
                    volatility_pct: rng.gen_range(0.5..6.0),
                    liquidity_tier: rng.gen_range(1..=3),
                },
                external_prior: None,
            };
            registry.dispatch_tick(symbol, event);
        }
    }
}
