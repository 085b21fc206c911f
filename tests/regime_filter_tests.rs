use decision_quant::model::belief::RegimeId;
use decision_quant::model::observation::Observation;
use decision_quant::regime::{RegimeFilter, RegimeModelSet};

fn flat_tick() -> Observation {
    Observation {
        price: 100.0,
        volume: 4.0,
        spread: 0.05,
        imbalance: 0.0,
        funding_rate: 0.0,
        gas_price: 25.0,
        social_mentions: 2.0,
    }
}

fn noisy_tick(i: u64) -> Observation {
    // Deterministic pseudo-noise, no RNG needed.
    let wave = ((i * 37) % 17) as f64 / 17.0 - 0.5;
    Observation {
        price: 100.0 + wave * 8.0,
        volume: 10.0 + wave.abs() * 30.0,
        spread: 0.05 + wave.abs() * 0.4,
        imbalance: wave,
        funding_rate: wave * 0.001,
        gas_price: 25.0 + wave * 10.0,
        social_mentions: 2.0 + wave.abs() * 15.0,
    }
}

#[test]
fn belief_is_normalized_on_every_tick() {
    let mut filter = RegimeFilter::new(RegimeModelSet::canonical(), 0.05);
    for i in 0..100 {
        let estimate = filter.step(&noisy_tick(i), None);
        assert!(
            estimate.belief.is_normalized(),
            "tick {i}: probabilities {:?}",
            estimate.belief.probabilities()
        );
        for p in estimate.belief.probabilities() {
            assert!((0.0..=1.0).contains(&p));
        }
        assert!(estimate.uncertainty.is_finite());
    }
}

#[test]
fn flat_market_converges_to_mean_reversion_regime() {
    let mut filter = RegimeFilter::new(RegimeModelSet::canonical(), 0.0);
    let mut final_prob = 0.0;
    for _ in 0..50 {
        let estimate = filter.step(&flat_tick(), None);
        final_prob = estimate.belief.probability_of(RegimeId::LowVolMeanReversion);
    }
    assert!(
        final_prob > 0.6,
        "expected mean-reversion regime to dominate, got {final_prob}"
    );
}

#[test]
fn repeated_observations_stabilize_the_ranking() {
    let mut filter = RegimeFilter::new(RegimeModelSet::canonical(), 0.0);
    let mut prob_at_20 = 0.0;
    let mut prob_at_50 = 0.0;
    for i in 1..=50 {
        let estimate = filter.step(&flat_tick(), None);
        if i >= 25 {
            assert_eq!(
                estimate.belief.dominant(),
                RegimeId::LowVolMeanReversion,
                "dominant regime flipped at tick {i}"
            );
        }
        if i == 20 {
            prob_at_20 = estimate.belief.probability_of(RegimeId::LowVolMeanReversion);
        }
        if i == 50 {
            prob_at_50 = estimate.belief.probability_of(RegimeId::LowVolMeanReversion);
        }
    }
    assert!(
        prob_at_50 >= prob_at_20 - 1e-6,
        "posterior weakened from {prob_at_20} to {prob_at_50}"
    );
}

#[test]
fn malformed_observations_degrade_toward_uniform() {
    let mut filter = RegimeFilter::new(RegimeModelSet::canonical(), 0.0);
    for _ in 0..30 {
        let _ = filter.step(&flat_tick(), None);
    }

    let bad = Observation {
        price: f64::NAN,
        volume: f64::INFINITY,
        ..flat_tick()
    };
    let mut last = None;
    for _ in 0..60 {
        let estimate = filter.step(&bad, None);
        assert!(estimate.belief.is_normalized());
        assert!(estimate.state.microprice.is_finite());
        last = Some(estimate);
    }
    let belief = last.unwrap().belief;
    for p in belief.probabilities() {
        assert!(
            (p - 0.25).abs() < 0.05,
            "posterior should be near uniform after sustained bad input, got {p}"
        );
    }
}

#[test]
fn external_prior_cannot_dominate_the_statistical_posterior() {
    let mut with_hint = RegimeFilter::new(RegimeModelSet::canonical(), 0.10);
    // Hint insists on macro stress while the data stays flat and calm.
    let stress_hint = [0.0, 0.0, 0.0, 1.0];
    let mut final_prob = 0.0;
    for _ in 0..50 {
        let estimate = with_hint.step(&flat_tick(), Some(&stress_hint));
        final_prob = estimate.belief.probability_of(RegimeId::LowVolMeanReversion);
    }
    assert!(
        final_prob > 0.6,
        "external hint overrode the data: mean-reversion prob {final_prob}"
    );
}
