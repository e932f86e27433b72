//! Whole-activity derived features: elevation, normalized power, heart-rate
//! drift, spikes, inflection points, moving-average trends, and pairwise
//! correlations.

use crate::stats::numeric_stats;

/// Rolling window for normalized power (per the standard 30-sample model).
pub const NP_WINDOW: usize = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Elevation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Total climb and descent from consecutive altitude deltas.
pub fn elevation_gain_loss(altitude: &[f64]) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    for pair in altitude.windows(2) {
        if !pair[0].is_finite() || !pair[1].is_finite() {
            continue;
        }
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gain += delta;
        } else {
            loss -= delta;
        }
    }
    (gain, loss)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Normalized power
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 30-sample rolling average raised to the 4th power, averaged, 4th root.
/// `None` when fewer than [`NP_WINDOW`] finite samples exist.
pub fn normalized_power(watts: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = watts.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < NP_WINDOW {
        return None;
    }

    let mut window_sum: f64 = finite[..NP_WINDOW].iter().sum();
    let mut fourth_sum = (window_sum / NP_WINDOW as f64).powi(4);
    let mut windows = 1usize;

    for i in NP_WINDOW..finite.len() {
        window_sum += finite[i] - finite[i - NP_WINDOW];
        fourth_sum += (window_sum / NP_WINDOW as f64).powi(4);
        windows += 1;
    }

    Some((fourth_sum / windows as f64).powf(0.25))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heart-rate drift
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Least-squares slope of heart rate over time, in bpm per hour.
/// `None` without at least two finite pairs spanning nonzero time.
pub fn heart_rate_drift(time_s: &[f64], heartrate: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = time_s
        .iter()
        .zip(heartrate.iter())
        .filter(|(t, h)| t.is_finite() && h.is_finite())
        .map(|(t, h)| (*t, *h))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_t = pairs.iter().map(|(t, _)| t).sum::<f64>() / n;
    let mean_h = pairs.iter().map(|(_, h)| h).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_t = 0.0;
    for (t, h) in &pairs {
        cov += (t - mean_t) * (h - mean_h);
        var_t += (t - mean_t).powi(2);
    }
    if var_t <= f64::EPSILON {
        return None;
    }

    Some(cov / var_t * 3600.0)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Spikes & inflection points
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Indices of samples above `mean + k·stdev`. Empty when the channel has
/// no spread (a single point can never spike).
pub fn spikes(values: &[f64], k: f64) -> Vec<usize> {
    let stats = match numeric_stats(values) {
        Some(s) if s.stdev > f64::EPSILON => s,
        _ => return Vec::new(),
    };
    let threshold = stats.mean + k * stats.stdev;
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite() && **v > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Indices where the sample-to-sample gradient reverses sign with a
/// significant magnitude change (beyond two standard deviations of the
/// gradient distribution).
pub fn inflection_points(values: &[f64]) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }

    let deltas: Vec<f64> = values
        .windows(2)
        .map(|w| {
            if w[0].is_finite() && w[1].is_finite() {
                w[1] - w[0]
            } else {
                0.0
            }
        })
        .collect();

    let delta_stats = match numeric_stats(&deltas) {
        Some(s) if s.stdev > f64::EPSILON => s,
        _ => return Vec::new(),
    };
    let threshold = 2.0 * delta_stats.stdev;

    let mut points = Vec::new();
    for i in 1..deltas.len() {
        let (prev, curr) = (deltas[i - 1], deltas[i]);
        let sign_flip = (prev > 0.0 && curr < 0.0) || (prev < 0.0 && curr > 0.0);
        if sign_flip && (curr - prev).abs() > threshold {
            points.push(i);
        }
    }
    points
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Moving-average trend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Steady,
}

impl Trend {
    pub fn label(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Steady => "steady",
        }
    }
}

/// Smooth with a centered-ish trailing window.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().filter(|v| v.is_finite()).sum();
    let mut finite = values[..window].iter().filter(|v| v.is_finite()).count();
    out.push(if finite > 0 { sum / finite as f64 } else { f64::NAN });

    for i in window..values.len() {
        let leaving = values[i - window];
        let entering = values[i];
        if leaving.is_finite() {
            sum -= leaving;
            finite -= 1;
        }
        if entering.is_finite() {
            sum += entering;
            finite += 1;
        }
        out.push(if finite > 0 { sum / finite as f64 } else { f64::NAN });
    }
    out
}

/// Direction of the smoothed signal: compares first- and last-third means;
/// a move under 2% of the overall mean counts as steady.
pub fn trend(values: &[f64], window: usize) -> Option<(Trend, f64)> {
    let smoothed = moving_average(values, window);
    if smoothed.len() < 3 {
        return None;
    }
    let third = smoothed.len() / 3;
    let head = numeric_stats(&smoothed[..third.max(1)])?;
    let tail = numeric_stats(&smoothed[smoothed.len() - third.max(1)..])?;
    let overall = numeric_stats(&smoothed)?;

    let change = tail.mean - head.mean;
    let relative = if overall.mean.abs() > f64::EPSILON {
        change / overall.mean.abs()
    } else {
        0.0
    };
    let direction = if relative > 0.02 {
        Trend::Rising
    } else if relative < -0.02 {
        Trend::Falling
    } else {
        Trend::Steady
    };
    Some((direction, change))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Correlation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pearson correlation over paired finite samples. `None` when fewer than
/// two pairs remain or either side is constant.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevation_sums_signed_deltas() {
        let (gain, loss) = elevation_gain_loss(&[100.0, 110.0, 105.0, 120.0]);
        assert!((gain - 25.0).abs() < 1e-12);
        assert!((loss - 5.0).abs() < 1e-12);
    }

    #[test]
    fn elevation_skips_gaps() {
        let (gain, loss) = elevation_gain_loss(&[100.0, f64::NAN, 110.0]);
        assert_eq!(gain, 0.0);
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn normalized_power_constant_equals_constant() {
        let watts = vec![200.0; 120];
        let np = normalized_power(&watts).unwrap();
        assert!((np - 200.0).abs() < 1e-9);
    }

    #[test]
    fn normalized_power_exceeds_mean_for_variable_effort() {
        // Alternate hard/easy blocks; NP must land above the plain mean.
        let mut watts = Vec::new();
        for block in 0..8 {
            let level = if block % 2 == 0 { 300.0 } else { 100.0 };
            watts.extend(std::iter::repeat(level).take(60));
        }
        let np = normalized_power(&watts).unwrap();
        let mean = watts.iter().sum::<f64>() / watts.len() as f64;
        assert!(np > mean, "np={np} mean={mean}");
    }

    #[test]
    fn normalized_power_needs_a_full_window() {
        assert!(normalized_power(&[250.0; 29]).is_none());
        assert!(normalized_power(&[250.0; 30]).is_some());
    }

    #[test]
    fn hr_drift_recovers_linear_slope() {
        // 10 bpm over 3600 s → 10 bpm/h.
        let time: Vec<f64> = (0..=3600).step_by(60).map(|t| t as f64).collect();
        let hr: Vec<f64> = time.iter().map(|t| 140.0 + t / 360.0).collect();
        let drift = heart_rate_drift(&time, &hr).unwrap();
        assert!((drift - 10.0).abs() < 1e-6, "drift={drift}");
    }

    #[test]
    fn hr_drift_degenerate_inputs() {
        assert!(heart_rate_drift(&[0.0], &[150.0]).is_none());
        assert!(heart_rate_drift(&[5.0, 5.0], &[150.0, 160.0]).is_none());
    }

    #[test]
    fn spikes_flag_outliers_only() {
        let mut values = vec![200.0; 100];
        values[40] = 900.0;
        let found = spikes(&values, 2.0);
        assert_eq!(found, vec![40]);
    }

    #[test]
    fn single_point_has_no_spikes_or_inflections() {
        assert!(spikes(&[42.0], 2.0).is_empty());
        assert!(inflection_points(&[42.0]).is_empty());
    }

    #[test]
    fn inflection_found_at_sharp_peak() {
        // Gentle climb, then a steep descent: one sharp reversal.
        let mut values: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let peak = values[values.len() - 1];
        values.extend((1..=20).map(|i| peak - i as f64 * 2.0));
        let points = inflection_points(&values);
        assert_eq!(points.len(), 1);
        assert!((98..=100).contains(&points[0]), "at {}", points[0]);
    }

    #[test]
    fn moving_average_window_math() {
        let out = moving_average(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![1.5, 2.5, 3.5]);
        assert!(moving_average(&[1.0], 2).is_empty());
    }

    #[test]
    fn trend_detects_direction() {
        let rising: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let (dir, change) = trend(&rising, 5).unwrap();
        assert_eq!(dir, Trend::Rising);
        assert!(change > 0.0);

        let steady = vec![150.0; 100];
        let (dir, _) = trend(&steady, 5).unwrap();
        assert_eq!(dir, Trend::Steady);
    }

    #[test]
    fn correlation_bounds_and_sign() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|v| v * 3.0 + 7.0).collect();
        assert!((correlation(&a, &b).unwrap() - 1.0).abs() < 1e-9);

        let inverse: Vec<f64> = a.iter().map(|v| -v).collect();
        assert!((correlation(&a, &inverse).unwrap() + 1.0).abs() < 1e-9);

        assert!(correlation(&a, &vec![5.0; 50]).is_none());
        assert!(correlation(&[1.0], &[2.0]).is_none());
    }
}
