use serde::Serialize;

/// Standard retracement ratios, ascending
pub const FIB_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FibLevel {
    pub ratio: f64,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FibResult {
    pub low: f64,
    pub high: f64,
    pub levels: Vec<FibLevel>,
}

/// Retracement levels between `low` and `high`.
///
/// Levels are direction agnostic: when `high < low` the bounds are swapped
/// instead of rejected, so a reversed pair gives the same result. Ratio 0 maps
/// to `high` and ratio 1 to `low`.
pub fn levels(low: f64, high: f64) -> FibResult {
    let (low, high) = if high < low { (high, low) } else { (low, high) };
    let span = high - low;

    let levels = FIB_RATIOS
        .iter()
        .map(|&ratio| FibLevel {
            ratio,
            value: retracement(low, high, span, ratio),
        })
        .collect();

    FibResult { low, high, levels }
}

fn retracement(low: f64, high: f64, span: f64, ratio: f64) -> f64 {
    // the end points are pinned to avoid `high - 1.0 * span` rounding away from `low`
    if ratio == 1.0 {
        low
    } else {
        high - ratio * span
    }
}
