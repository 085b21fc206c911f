use decision_quant::error::PipelineError;
use decision_quant::model::belief::{LatentState, RegimeBelief, RegimeEntry, RegimeId};
use decision_quant::model::features::ContextFeatures;
use decision_quant::model::signal::Direction;
use decision_quant::strategy::PolicyCatalog;

fn belief(probs: [f64; 4]) -> RegimeBelief {
    RegimeBelief {
        regimes: RegimeId::ALL
            .iter()
            .zip(probs.iter())
            .map(|(&id, &probability)| RegimeEntry {
                id,
                probability,
                mean_reversion_strength: 0.8,
                volatility: 0.02,
                momentum: 0.1,
            })
            .collect(),
    }
}

#[test]
fn reference_catalog_exposes_three_policies() {
    let catalog = PolicyCatalog::reference();
    assert_eq!(
        catalog.ids(),
        vec![
            "mean_reversion".to_string(),
            "momentum_breakout".to_string(),
            "volatility_fade".to_string(),
        ]
    );
}

#[test]
fn deciding_with_an_unknown_policy_is_a_wiring_error() {
    let catalog = PolicyCatalog::reference();
    let err = catalog
        .decide(
            "ghost",
            &LatentState::default(),
            &belief([0.25, 0.25, 0.25, 0.25]),
            &ContextFeatures::default(),
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownPolicy(id) if id == "ghost"));
}

#[test]
fn momentum_breakout_rides_a_trend() {
    let catalog = PolicyCatalog::reference();
    let state = LatentState {
        momentum: 0.8,
        ..LatentState::default()
    };
    let signal = catalog
        .decide(
            "momentum_breakout",
            &state,
            &belief([0.1, 0.7, 0.1, 0.1]),
            &ContextFeatures::default(),
        )
        .unwrap();
    assert_eq!(signal.direction, Direction::Long);
    assert!(signal.confidence > 0.5);
    assert!(signal.win_probability > 0.5);
}

#[test]
fn momentum_breakout_stays_flat_without_the_trending_regime() {
    let catalog = PolicyCatalog::reference();
    let state = LatentState {
        momentum: 0.8,
        ..LatentState::default()
    };
    let signal = catalog
        .decide(
            "momentum_breakout",
            &state,
            &belief([0.7, 0.1, 0.1, 0.1]),
            &ContextFeatures::default(),
        )
        .unwrap();
    assert_eq!(signal.direction, Direction::Flat);
}

#[test]
fn mean_reversion_fades_a_stretched_book() {
    let catalog = PolicyCatalog::reference();
    let state = LatentState {
        imbalance: 0.6,
        ..LatentState::default()
    };
    let signal = catalog
        .decide(
            "mean_reversion",
            &state,
            &belief([0.8, 0.1, 0.05, 0.05]),
            &ContextFeatures::default(),
        )
        .unwrap();
    // Bid-heavy stretch gets sold back toward the mean.
    assert_eq!(signal.direction, Direction::Short);
}

#[test]
fn volatility_fade_stands_down_under_macro_stress() {
    let catalog = PolicyCatalog::reference();
    let state = LatentState {
        momentum: 1.0,
        ..LatentState::default()
    };
    let features = ContextFeatures {
        sentiment: 1.0,
        ..ContextFeatures::default()
    };
    let signal = catalog
        .decide(
            "volatility_fade",
            &state,
            &belief([0.1, 0.1, 0.3, 0.5]),
            &features,
        )
        .unwrap();
    assert_eq!(signal.direction, Direction::Flat);

    let active = catalog
        .decide(
            "volatility_fade",
            &state,
            &belief([0.2, 0.2, 0.5, 0.1]),
            &features,
        )
        .unwrap();
    assert_eq!(active.direction, Direction::Short);
}
