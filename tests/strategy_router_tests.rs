use std::collections::HashMap;

use decision_quant::error::PipelineError;
use decision_quant::model::features::ContextFeatures;
use decision_quant::strategy_router::{RouterConfig, StrategyRouter};

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn choose_with_empty_catalog_is_a_wiring_error() {
    let mut router = StrategyRouter::with_seed(RouterConfig::default(), ids(&[]), 7);
    let err = router.choose(&ContextFeatures::default()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyCatalog));
}

#[test]
fn update_with_unknown_policy_is_a_wiring_error() {
    let mut router = StrategyRouter::with_seed(RouterConfig::default(), ids(&["a", "b"]), 7);
    let err = router
        .update("missing", 1.0, &ContextFeatures::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownPolicy(id) if id == "missing"));
}

#[test]
fn same_seed_replays_identical_choices() {
    let features = ContextFeatures::default();
    let mut first = StrategyRouter::with_seed(RouterConfig::default(), ids(&["a", "b", "c"]), 42);
    let mut second = StrategyRouter::with_seed(RouterConfig::default(), ids(&["a", "b", "c"]), 42);
    for _ in 0..50 {
        let x = first.choose(&features).unwrap();
        let y = second.choose(&features).unwrap();
        assert_eq!(x.policy_id, y.policy_id);
        assert!((x.score - y.score).abs() < 1e-12);
    }
}

#[test]
fn cold_start_spreads_choices_nearly_uniformly() {
    let features = ContextFeatures::default();
    let mut router = StrategyRouter::with_seed(RouterConfig::default(), ids(&["a", "b", "c"]), 1);
    let mut counts: HashMap<String, u32> = HashMap::new();
    for _ in 0..300 {
        let choice = router.choose(&features).unwrap();
        *counts.entry(choice.policy_id).or_default() += 1;
    }
    for name in ["a", "b", "c"] {
        let n = counts.get(name).copied().unwrap_or(0);
        assert!(n >= 50, "policy {name} chosen only {n}/300 times at cold start");
    }
}

#[test]
fn rewarded_policy_comes_to_dominate() {
    let features = ContextFeatures::default();
    let mut router = StrategyRouter::with_seed(RouterConfig::default(), ids(&["good", "bad"]), 3);
    for _ in 0..50 {
        router.update("good", 1.0, &features).unwrap();
        router.update("bad", -1.0, &features).unwrap();
    }
    let mut good = 0;
    for _ in 0..100 {
        if router.choose(&features).unwrap().policy_id == "good" {
            good += 1;
        }
    }
    assert!(good > 70, "rewarded policy chosen only {good}/100 times");
}

#[test]
fn exploration_bonus_decays_with_selection_count() {
    let features = ContextFeatures::default();
    let mut router = StrategyRouter::with_seed(RouterConfig::default(), ids(&["only"]), 9);
    let first = router.choose(&features).unwrap().exploration_bonus;
    for _ in 0..98 {
        let _ = router.choose(&features).unwrap();
    }
    let late = router.choose(&features).unwrap().exploration_bonus;
    assert!(
        late < first,
        "bonus should decay: first {first}, after 100 picks {late}"
    );
}

#[test]
fn contextual_weights_follow_reward_times_feature() {
    let features = ContextFeatures {
        sentiment: 1.0,
        ..ContextFeatures::default()
    };
    let mut router = StrategyRouter::with_seed(RouterConfig::default(), ids(&["a"]), 5);
    for _ in 0..20 {
        router.update("a", 1.0, &features).unwrap();
    }
    let posterior = router.posterior("a").unwrap();
    let sentiment_index = ContextFeatures::DIM - 2;
    assert!(
        posterior.weights[sentiment_index] > 0.0,
        "sentiment weight should move with positive rewards"
    );
    // Features that were always zero keep zero weight.
    assert_eq!(posterior.weights[ContextFeatures::DIM - 1], 0.0);
    assert_eq!(posterior.observations, 20);
}

#[test]
fn beta_posterior_counts_wins_and_losses() {
    let features = ContextFeatures::default();
    let mut router = StrategyRouter::with_seed(RouterConfig::default(), ids(&["a"]), 5);
    for _ in 0..6 {
        router.update("a", 0.5, &features).unwrap();
    }
    for _ in 0..4 {
        router.update("a", -0.5, &features).unwrap();
    }
    let posterior = router.posterior("a").unwrap();
    assert!((posterior.alpha - 7.0).abs() < 1e-12); // 1.0 prior + 6 wins
    assert!((posterior.beta - 5.0).abs() < 1e-12); // 1.0 prior + 4 losses
}

#[test]
fn non_finite_rewards_are_absorbed() {
    let features = ContextFeatures::default();
    let mut router = StrategyRouter::with_seed(RouterConfig::default(), ids(&["a"]), 5);
    router.update("a", f64::NAN, &features).unwrap();
    let posterior = router.posterior("a").unwrap();
    assert!((posterior.alpha - 1.0).abs() < 1e-12);
    assert!((posterior.beta - 1.0).abs() < 1e-12);
    assert_eq!(posterior.observations, 0);
}
