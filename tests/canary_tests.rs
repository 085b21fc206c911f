use decision_quant::canary::{CanaryConfig, CanaryController, CanaryState, StageCriteria};
use decision_quant::model::trade::TradeOutcome;

fn trade(pnl: f64, n: u64) -> TradeOutcome {
    TradeOutcome {
        trade_id: format!("t-{n}"),
        symbol: "BTCUSDT".to_string(),
        policy_id: "momentum_breakout".to_string(),
        pnl,
        entry_ms: n * 1_000,
        exit_ms: n * 1_000 + 500,
    }
}

/// Disabled-stage criteria that promote on the very first trade, so tests
/// can evaluate the canary stage in isolation.
fn instant_enable() -> StageCriteria {
    StageCriteria {
        min_trades: 0,
        min_win_rate: 0.0,
        max_drawdown: 1.0,
        pnl_threshold: f64::MIN,
        cvar_cap: f64::MAX,
    }
}

fn canary_stage_controller() -> CanaryController {
    let config = CanaryConfig {
        disabled: instant_enable(),
        ..CanaryConfig::default()
    };
    let mut controller = CanaryController::new(config);
    let promoted = controller.record_trade(&trade(0.5, 0));
    assert_eq!(promoted, Some(CanaryState::Canary));
    controller
}

#[test]
fn starts_disabled_with_zero_weight() {
    let controller = CanaryController::new(CanaryConfig::default());
    assert_eq!(controller.state(), CanaryState::Disabled);
    assert_eq!(controller.weight(), 0.0);
}

#[test]
fn promotes_to_partial_when_all_criteria_hold_at_once() {
    let mut controller = canary_stage_controller();

    // Ten small losses, then wins that cross the P&L threshold on the last.
    let mut n = 1;
    for _ in 0..10 {
        assert_eq!(controller.record_trade(&trade(-2.0, n)), None);
        n += 1;
    }
    let mut promoted_at = None;
    for i in 0..15 {
        if let Some(state) = controller.record_trade(&trade(8.0, n)) {
            promoted_at = Some((i, state));
            break;
        }
        n += 1;
    }
    // P&L reaches +100.5 only on the 15th win; trades, win rate, drawdown
    // and CVaR were already satisfied before.
    let (index, state) = promoted_at.expect("should promote");
    assert_eq!(state, CanaryState::Partial);
    assert_eq!(index, 14);
    assert_eq!(controller.weight(), 0.10);
}

#[test]
fn individually_satisfied_criteria_do_not_promote() {
    // Enough trades, perfect win rate, no drawdown, but P&L short.
    let mut controller = canary_stage_controller();
    for n in 0..30 {
        let promoted = controller.record_trade(&trade(1.0, n + 1));
        assert_eq!(promoted, None, "P&L threshold alone must block");
    }

    // P&L satisfied but win rate far below the floor.
    let mut controller = canary_stage_controller();
    let mut n = 1;
    for _ in 0..22 {
        assert_eq!(controller.record_trade(&trade(-0.01, n)), None);
        n += 1;
    }
    for _ in 0..3 {
        let promoted = controller.record_trade(&trade(60.0, n));
        assert_eq!(promoted, None, "win rate alone must block");
        n += 1;
    }

    // Everything healthy but too few trades.
    let mut controller = canary_stage_controller();
    for n in 0..5 {
        let promoted = controller.record_trade(&trade(30.0, n + 1));
        assert_eq!(promoted, None, "trade count alone must block");
    }

    // Profitable and frequent, but the drawdown cap is breached.
    let mut controller = canary_stage_controller();
    let mut n = 1;
    for _ in 0..12 {
        assert_eq!(controller.record_trade(&trade(60.0, n)), None);
        n += 1;
    }
    for _ in 0..2 {
        assert_eq!(controller.record_trade(&trade(-300.0, n)), None);
        n += 1;
    }
    for _ in 0..12 {
        let promoted = controller.record_trade(&trade(10.0, n));
        assert_eq!(promoted, None, "drawdown cap must block");
        n += 1;
    }
}

#[test]
fn weight_never_decreases_without_explicit_rollback() {
    let mut controller = canary_stage_controller();
    let mut last_weight = controller.weight();
    for n in 0..300 {
        // Alternating stream with a profitable tilt.
        let pnl = if n % 3 == 0 { -4.0 } else { 9.0 };
        let _ = controller.record_trade(&trade(pnl, n + 1));
        let weight = controller.weight();
        assert!(
            weight >= last_weight,
            "weight dropped from {last_weight} to {weight} at trade {n}"
        );
        last_weight = weight;
    }
}

#[test]
fn rollback_is_explicit_and_steps_down_one_state() {
    let mut controller = canary_stage_controller();
    assert_eq!(controller.state(), CanaryState::Canary);

    let state = controller.rollback("operator hold");
    assert_eq!(state, CanaryState::Disabled);
    assert_eq!(controller.weight(), 0.0);

    // Rollback at the floor stays at the floor.
    assert_eq!(controller.rollback("again"), CanaryState::Disabled);
}

#[test]
fn circuit_breaker_suppresses_promotion() {
    let mut controller = canary_stage_controller();
    controller.set_circuit_breaker(true);

    let mut n = 1;
    for _ in 0..30 {
        let promoted = controller.record_trade(&trade(8.0, n));
        assert_eq!(promoted, None, "breaker must suppress promotion");
        n += 1;
    }

    controller.set_circuit_breaker(false);
    let promoted = controller.record_trade(&trade(8.0, n));
    assert_eq!(promoted, Some(CanaryState::Partial));
}

#[test]
fn window_is_capped_at_200_trades() {
    let mut controller = CanaryController::new(CanaryConfig::default());
    for n in 0..250 {
        let _ = controller.record_trade(&trade(1.0, n));
    }
    let status = controller.status();
    assert_eq!(status.metrics.window_trades, 200);
    assert_eq!(status.metrics.total_fills, 250);
    // Only the 200 most recent trades count toward window P&L.
    assert!((status.metrics.total_pnl - 200.0).abs() < 1e-9);
}

#[test]
fn status_ranks_unmet_requirements_for_operators() {
    let controller = CanaryController::new(CanaryConfig::default());
    let status = controller.status();
    assert_eq!(status.state, CanaryState::Disabled);
    assert!(!status.unmet_requirements.is_empty());
    assert!(status
        .unmet_requirements
        .iter()
        .any(|r| r.contains("trades")));

    let encoded = serde_json::to_string(&status).expect("status must serialize");
    assert!(encoded.contains("unmet_requirements"));
}
