//! Numerically stable per-channel statistics.
//!
//! Non-finite samples (missing values decoded as NaN) are filtered before
//! any computation. Variance uses the two-pass formula; percentiles use
//! linear interpolation between order statistics.

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Numeric channels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    /// Coefficient of variation (stdev / mean); 0 when the mean is 0.
    pub cv: f64,
    pub range: f64,
    pub q25: f64,
    pub q75: f64,
}

/// Compute stats over a numeric channel. Returns `None` when no finite
/// samples remain (empty channels are omitted from output, not zero-filled).
pub fn numeric_stats(values: &[f64]) -> Option<ChannelStats> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }

    let count = finite.len();
    let mean = finite.iter().sum::<f64>() / count as f64;

    // Two-pass variance: deviations from the already-computed mean.
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let stdev = variance.sqrt();
    let cv = if mean.abs() > f64::EPSILON {
        stdev / mean.abs()
    } else {
        0.0
    };

    finite.sort_by(f64::total_cmp);
    let min = finite[0];
    let max = finite[count - 1];

    Some(ChannelStats {
        count,
        min,
        max,
        mean,
        median: percentile(&finite, 50.0),
        stdev,
        cv,
        range: max - min,
        q25: percentile(&finite, 25.0),
        q75: percentile(&finite, 75.0),
    })
}

/// Interpolated percentile over an ascending-sorted slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let weight = rank - lower as f64;
                sorted[lower] * (1.0 - weight) + sorted[upper] * weight
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Boolean channel (moving)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolStats {
    pub true_count: usize,
    pub false_count: usize,
}

impl BoolStats {
    pub fn true_pct(&self) -> f64 {
        let total = self.true_count + self.false_count;
        if total == 0 {
            0.0
        } else {
            self.true_count as f64 / total as f64 * 100.0
        }
    }

    pub fn false_pct(&self) -> f64 {
        let total = self.true_count + self.false_count;
        if total == 0 {
            0.0
        } else {
            100.0 - self.true_pct()
        }
    }
}

pub fn boolean_stats(values: &[bool]) -> Option<BoolStats> {
    if values.is_empty() {
        return None;
    }
    let true_count = values.iter().filter(|v| **v).count();
    Some(BoolStats {
        true_count,
        false_count: values.len() - true_count,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Geographic channel (latlng)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub struct LatLngStats {
    pub count: usize,
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

pub fn latlng_stats(points: &[[f64; 2]]) -> Option<LatLngStats> {
    if points.is_empty() {
        return None;
    }
    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut min_lng = f64::INFINITY;
    let mut max_lng = f64::NEG_INFINITY;
    for p in points {
        min_lat = min_lat.min(p[0]);
        max_lat = max_lat.max(p[0]);
        min_lng = min_lng.min(p[1]);
        max_lng = max_lng.max(p[1]);
    }
    Some(LatLngStats {
        count: points.len(),
        start: points[0],
        end: points[points.len() - 1],
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
