//! Deterministic trend scoring.
//!
//! Three signals are read off the tail of the interest series, normalized
//! against fixed anchors, and combined with fixed weights:
//!
//! - growth: mean of the last 7 values over the mean of the last 30,
//!   anchored on [0.7, 1.7]
//! - slope: least-squares slope of the last 14 values divided by their mean,
//!   anchored on [−0.5, +0.5]
//! - peak: max of the last 30 values over 100, already in [0, 1]
//!
//! `trend_score = 100 × clamp(0.5·G + 0.3·S + 0.2·P)`. Identical inputs
//! produce identical outputs; the keyword and country only shape the
//! explanation text.

use crate::types::{Country, Signals};

const WEIGHT_GROWTH: f64 = 0.5;
const WEIGHT_SLOPE: f64 = 0.3;
const WEIGHT_PEAK: f64 = 0.2;

const GROWTH_ANCHOR_LOW: f64 = 0.7;
const GROWTH_ANCHOR_HIGH: f64 = 1.7;
const SLOPE_ANCHOR: f64 = 0.5;

/// Output of the scoring engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub trend_score: f64,
    pub signals: Signals,
    pub explain: Vec<String>,
}

/// Score an interest series.
///
/// Values are the provider's 0–100 integers in ascending date order. Any
/// length ≥ 0 is tolerated: short windows shrink to what is available and
/// degenerate inputs fall back to neutral signal values.
pub fn score_series(values: &[u32], keyword: &str, country: Country) -> Scored {
    let growth = growth_7_vs_30(values);
    let slope = slope_14d(values);
    let peak = recent_peak_30d(values);

    // Full precision through the normalization and combination; rounding
    // applies only to the reported values.
    let g = clamp01((growth - GROWTH_ANCHOR_LOW) / (GROWTH_ANCHOR_HIGH - GROWTH_ANCHOR_LOW));
    let s = clamp01((slope + SLOPE_ANCHOR) / (2.0 * SLOPE_ANCHOR));
    let p = peak;

    let combined = clamp01(WEIGHT_GROWTH * g + WEIGHT_SLOPE * s + WEIGHT_PEAK * p);
    let trend_score = round_to(100.0 * combined, 2);

    let signals = Signals {
        growth_7_vs_30: round_to(growth, 2),
        slope_14d: round_to(slope, 4),
        recent_peak_30d: round_to(peak, 2),
    };

    Scored { trend_score, signals, explain: explain(&signals, keyword, country) }
}

/// Mean of the last 7 values over the mean of the last 30. Neutral (1.0)
/// when either window is empty or the 30-window mean is zero.
fn growth_7_vs_30(values: &[u32]) -> f64 {
    let recent = tail(values, 7);
    let baseline = tail(values, 30);
    if recent.is_empty() || baseline.is_empty() {
        return 1.0;
    }
    let baseline_mean = mean(baseline);
    if baseline_mean == 0.0 {
        return 1.0;
    }
    mean(recent) / baseline_mean
}

/// Least-squares slope of the last 14 values against indices 0..n, divided
/// by the window mean so the result is scale-free. Zero on fewer than two
/// points, a zero mean, or a degenerate denominator.
fn slope_14d(values: &[u32]) -> f64 {
    let window = tail(values, 14);
    let n = window.len();
    if n < 2 {
        return 0.0;
    }

    let window_mean = mean(window);
    if window_mean == 0.0 {
        return 0.0;
    }

    let n_f = n as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, &value) in window.iter().enumerate() {
        let x = i as f64;
        let y = value as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n_f * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    let slope = (n_f * sum_xy - sum_x * sum_y) / denominator;
    slope / window_mean
}

/// Max of the last 30 values, as a fraction of the 0–100 scale.
fn recent_peak_30d(values: &[u32]) -> f64 {
    tail(values, 30).iter().copied().max().map_or(0.0, |peak| peak as f64 / 100.0)
}

/// Exactly four lines: growth, momentum, peak, attribution.
fn explain(signals: &Signals, keyword: &str, country: Country) -> Vec<String> {
    let growth_pct = (signals.growth_7_vs_30 - 1.0).abs() * 100.0;
    let growth_line = if signals.growth_7_vs_30 > 1.1 {
        format!("grew {growth_pct:.1}% in the last 7 days versus the 30-day average")
    } else if signals.growth_7_vs_30 < 0.9 {
        format!("fell {growth_pct:.1}% in the last 7 days versus the 30-day average")
    } else {
        "stable versus the 30-day average".to_string()
    };

    let momentum_line = if signals.slope_14d > 0.01 {
        "positive momentum over the last 14 days"
    } else if signals.slope_14d < -0.01 {
        "negative momentum over the last 14 days"
    } else {
        "flat momentum over the last 14 days"
    }
    .to_string();

    let peak_pct = signals.recent_peak_30d * 100.0;
    let peak_line = if signals.recent_peak_30d > 0.8 {
        format!("high recent peak ({peak_pct:.0}% of maximum interest)")
    } else if signals.recent_peak_30d > 0.5 {
        format!("moderate recent peak ({peak_pct:.0}% of maximum interest)")
    } else {
        format!("low recent peak ({peak_pct:.0}% of maximum interest)")
    };

    let attribution_line = format!("search interest for {keyword:?} measured in {country}");

    vec![growth_line, momentum_line, peak_line, attribution_line]
}

fn tail(values: &[u32], count: usize) -> &[u32] {
    &values[values.len().saturating_sub(count)..]
}

fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn flat_series_scores_forty() {
        let values = vec![50u32; 30];
        let scored = score_series(&values, "stable", Country::ES);

        assert_close(scored.signals.growth_7_vs_30, 1.0, 1e-9);
        assert_close(scored.signals.slope_14d, 0.0, 1e-9);
        assert_close(scored.signals.recent_peak_30d, 0.5, 1e-9);
        assert_close(scored.trend_score, 40.0, 0.01);

        assert_eq!(scored.explain.len(), 4);
        assert!(scored.explain[0].contains("stable"));
        assert!(scored.explain[1].contains("flat"));
        assert!(scored.explain[2].contains("moderate"));
        assert!(scored.explain[3].contains("ES"));
    }

    #[test]
    fn linear_ramp_scores_high_and_grows() {
        // 20 → 90 over 15 days, step 5.
        let values: Vec<u32> = (0..15).map(|i| 20 + i * 5).collect();
        let scored = score_series(&values, "bitcoin", Country::MX);

        assert!(scored.signals.growth_7_vs_30 > 1.0);
        assert!(scored.signals.slope_14d > 0.0);
        assert_close(scored.signals.recent_peak_30d, 0.90, 1e-9);
        assert!(scored.trend_score > 60.0);
        assert!(scored.explain[0].starts_with("grew"));
        assert!(scored.explain[1].contains("positive"));
    }

    #[test]
    fn all_zero_series_is_the_no_signal_baseline() {
        // Neutral growth (1.0 ⇒ G = 0.3), flat slope (S = 0.5), zero peak.
        let values = vec![0u32; 30];
        let scored = score_series(&values, "nothing", Country::CR);

        assert_close(scored.signals.growth_7_vs_30, 1.0, 1e-9);
        assert_close(scored.signals.slope_14d, 0.0, 1e-9);
        assert_close(scored.signals.recent_peak_30d, 0.0, 1e-9);
        assert_close(scored.trend_score, 30.0, 0.01);
    }

    #[test]
    fn empty_series_degrades_to_neutral() {
        let scored = score_series(&[], "nada", Country::ES);
        assert_close(scored.signals.growth_7_vs_30, 1.0, 1e-9);
        assert_close(scored.signals.slope_14d, 0.0, 1e-9);
        assert_close(scored.signals.recent_peak_30d, 0.0, 1e-9);
        assert_eq!(scored.explain.len(), 4);
    }

    #[test]
    fn single_point_scores_without_panicking() {
        let scored = score_series(&[80], "solo", Country::MX);
        assert_close(scored.signals.growth_7_vs_30, 1.0, 1e-9);
        assert_close(scored.signals.slope_14d, 0.0, 1e-9);
        assert_close(scored.signals.recent_peak_30d, 0.8, 1e-9);
    }

    #[test]
    fn short_series_shrinks_windows() {
        // 10 values: both windows see all of them, so growth is neutral-ish
        // and slope uses the available points.
        let values: Vec<u32> = (1..=10).map(|i| i * 10).collect();
        let scored = score_series(&values, "corto", Country::CR);
        assert!(scored.signals.slope_14d > 0.0);
        assert!(scored.trend_score <= 100.0);
    }

    #[test]
    fn falling_series_reports_fell() {
        let mut values = vec![90u32; 23];
        values.extend(std::iter::repeat(20u32).take(7));
        let scored = score_series(&values, "caida", Country::ES);

        assert!(scored.signals.growth_7_vs_30 < 0.9);
        assert!(scored.explain[0].starts_with("fell"));
        assert!(scored.explain[1].contains("negative"));
    }

    #[test]
    fn score_stays_in_range_for_extremes() {
        let spiky: Vec<u32> = (0..60).map(|i| if i % 2 == 0 { 0 } else { 100 }).collect();
        for series in [vec![100u32; 40], spiky, vec![1u32; 3]] {
            let scored = score_series(&series, "x y", Country::MX);
            assert!((0.0..=100.0).contains(&scored.trend_score));
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let values: Vec<u32> = (0..45).map(|i| (i * 7) % 101).collect();
        let a = score_series(&values, "repeat", Country::ES);
        let b = score_series(&values, "repeat", Country::ES);
        assert_eq!(a, b);
    }

    #[test]
    fn score_is_the_formula_on_unrounded_signals() {
        // growth = 67 / 61.6333… here, so the rounded signal (1.09) and the
        // raw one (1.0870…) normalize differently; the score must follow
        // the raw value.
        let mut values = vec![60u32; 23];
        values.extend(std::iter::repeat(67u32).take(7));
        let scored = score_series(&values, "precision", Country::ES);

        let growth = growth_7_vs_30(&values);
        let slope = slope_14d(&values);
        let peak = recent_peak_30d(&values);
        let g = clamp01((growth - GROWTH_ANCHOR_LOW) / (GROWTH_ANCHOR_HIGH - GROWTH_ANCHOR_LOW));
        let s = clamp01((slope + SLOPE_ANCHOR) / (2.0 * SLOPE_ANCHOR));
        let expected =
            round_to(100.0 * clamp01(WEIGHT_GROWTH * g + WEIGHT_SLOPE * s + WEIGHT_PEAK * peak), 2);

        assert_close(scored.trend_score, expected, 1e-9);
        // The reported signal is still the rounded form.
        assert_close(scored.signals.growth_7_vs_30, round_to(growth, 2), 1e-9);
    }

    #[test]
    fn rounding_contract_holds() {
        let values: Vec<u32> = vec![33, 47, 12, 86, 54, 71, 29, 90, 14, 65, 37, 48, 59, 22, 81];
        let scored = score_series(&values, "ruido", Country::MX);

        let rounded2 = |v: f64| (v * 100.0).round() / 100.0;
        let rounded4 = |v: f64| (v * 10_000.0).round() / 10_000.0;
        assert_eq!(scored.trend_score, rounded2(scored.trend_score));
        assert_eq!(scored.signals.growth_7_vs_30, rounded2(scored.signals.growth_7_vs_30));
        assert_eq!(scored.signals.slope_14d, rounded4(scored.signals.slope_14d));
        assert_eq!(scored.signals.recent_peak_30d, rounded2(scored.signals.recent_peak_30d));
    }
}
