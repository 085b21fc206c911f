use crate::model::portfolio::PortfolioSnapshot;

/// Overlapping samples required before an estimate is trusted. Below this
/// the estimate stays 0 and the sizer applies no correlation discount.
pub const MIN_OVERLAP: usize = 20;

/// Pearson correlation over the aligned tails of two return series.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < MIN_OVERLAP {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Highest absolute correlation between `symbol` and any other open
/// position's return series. 0 when nothing overlaps long enough.
pub fn max_open_position_correlation(snapshot: &PortfolioSnapshot, symbol: &str) -> f64 {
    let Some(candidate) = snapshot.symbol_returns.get(symbol) else {
        return 0.0;
    };
    let candidate: Vec<f64> = candidate.iter().copied().collect();

    let mut max_abs = 0.0f64;
    for open_symbol in snapshot.positions.keys() {
        if open_symbol == symbol {
            continue;
        }
        let Some(series) = snapshot.symbol_returns.get(open_symbol) else {
            continue;
        };
        let series: Vec<f64> = series.iter().copied().collect();
        if let Some(r) = pearson(&candidate, &series) {
            max_abs = max_abs.max(r.abs());
        }
    }
    max_abs
}
