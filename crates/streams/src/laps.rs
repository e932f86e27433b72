//! Partitioning a stream set into analysis segments.
//!
//! Recorded laps drive the partition when the activity has them; otherwise
//! samples are split into equal-distance segments (one per kilometer).

use pl_strava::types::{Lap, StreamSet};

use crate::stats::numeric_stats;

/// One analysis segment: a labeled half-open sample range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub label: String,
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Segments from recorded laps. Indices are clamped to the sample count;
/// degenerate laps are dropped.
pub fn lap_segments(laps: &[Lap], sample_count: usize) -> Vec<Segment> {
    let mut segments = Vec::new();
    for (i, lap) in laps.iter().enumerate() {
        let start = lap.start_index.min(sample_count);
        // Strava's end_index is inclusive.
        let end = lap.end_index.saturating_add(1).min(sample_count);
        if end <= start {
            tracing::debug!(lap = i, "skipping degenerate lap boundaries");
            continue;
        }
        let label = if lap.name.is_empty() {
            format!("Lap {}", i + 1)
        } else {
            lap.name.clone()
        };
        segments.push(Segment { label, start, end });
    }
    segments
}

/// Fallback: one segment per kilometer of the distance channel. Returns a
/// single whole-range segment when no distance channel exists.
pub fn distance_segments(set: &StreamSet, meters_per_segment: f64) -> Vec<Segment> {
    let sample_count = set.sample_count();
    let distance = match set.numeric("distance") {
        Some(d) if !d.is_empty() => d,
        _ => {
            return vec![Segment {
                label: "Full activity".into(),
                start: 0,
                end: sample_count,
            }]
        }
    };

    let mut segments = Vec::new();
    let mut seg_start = 0usize;
    let mut next_boundary = meters_per_segment;
    let base = distance.iter().copied().find(|d| d.is_finite()).unwrap_or(0.0);

    for (i, d) in distance.iter().enumerate() {
        if !d.is_finite() {
            continue;
        }
        if d - base >= next_boundary {
            segments.push(Segment {
                label: format!("Km {}", segments.len() + 1),
                start: seg_start,
                end: i + 1,
            });
            seg_start = i + 1;
            next_boundary += meters_per_segment;
        }
    }
    if seg_start < distance.len() {
        segments.push(Segment {
            label: format!("Km {}", segments.len() + 1),
            start: seg_start,
            end: distance.len(),
        });
    }
    segments
}

/// Pick the partition for a stream set: laps when present, per-km otherwise.
pub fn partition(set: &StreamSet, laps: &[Lap]) -> Vec<Segment> {
    let from_laps = lap_segments(laps, set.sample_count());
    if !from_laps.is_empty() {
        return from_laps;
    }
    distance_segments(set, 1_000.0)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lap comparison
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentComparison {
    pub fastest: String,
    pub fastest_speed: f64,
    pub slowest: String,
    pub slowest_speed: f64,
    pub most_consistent: String,
    pub most_consistent_cv: f64,
}

/// Compare segments by the smoothed velocity channel: fastest and slowest
/// by mean speed, most consistent by lowest coefficient of variation.
/// `None` unless at least two segments have velocity data.
pub fn compare_segments(set: &StreamSet, segments: &[Segment]) -> Option<SegmentComparison> {
    let velocity = set.numeric("velocity_smooth")?;

    let mut measured: Vec<(&Segment, f64, f64)> = Vec::new();
    for segment in segments {
        let slice = &velocity[segment.start.min(velocity.len())..segment.end.min(velocity.len())];
        if let Some(stats) = numeric_stats(slice) {
            measured.push((segment, stats.mean, stats.cv));
        }
    }
    if measured.len() < 2 {
        return None;
    }

    let fastest = measured
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let slowest = measured
        .iter()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let most_consistent = measured
        .iter()
        .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))?;

    Some(SegmentComparison {
        fastest: fastest.0.label.clone(),
        fastest_speed: fastest.1,
        slowest: slowest.0.label.clone(),
        slowest_speed: slowest.1,
        most_consistent: most_consistent.0.label.clone(),
        most_consistent_cv: most_consistent.2,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use pl_strava::types::StreamChannel;
    use std::collections::BTreeMap;

    fn set_with(key: &str, channel: StreamChannel) -> StreamSet {
        let mut channels = BTreeMap::new();
        channels.insert(key.to_string(), channel);
        StreamSet { channels }
    }

    fn lap(start: usize, end: usize) -> Lap {
        Lap {
            start_index: start,
            end_index: end,
            ..Lap::default()
        }
    }

    #[test]
    fn lap_segments_clamp_and_label() {
        let laps = vec![lap(0, 99), lap(100, 250)];
        let segments = lap_segments(&laps, 200);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], Segment { label: "Lap 1".into(), start: 0, end: 100 });
        assert_eq!(segments[1].end, 200);
    }

    #[test]
    fn degenerate_laps_are_dropped() {
        let laps = vec![lap(500, 600)];
        assert!(lap_segments(&laps, 100).is_empty());
    }

    #[test]
    fn distance_fallback_splits_per_km() {
        // 25 samples, 100 m apart → 2.4 km → 3 segments.
        let distance: Vec<f64> = (0..25).map(|i| i as f64 * 100.0).collect();
        let set = set_with("distance", StreamChannel::Numeric(distance));
        let segments = distance_segments(&set, 1_000.0);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].label, "Km 1");
        assert_eq!(segments[0].start, 0);
        assert_eq!(segments[2].end, 25);
        // Segments tile the range without gaps.
        assert_eq!(segments[0].end, segments[1].start);
        assert_eq!(segments[1].end, segments[2].start);
    }

    #[test]
    fn no_distance_channel_yields_whole_range() {
        let set = set_with("heartrate", StreamChannel::Numeric(vec![140.0; 10]));
        let segments = distance_segments(&set, 1_000.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].label, "Full activity");
        assert_eq!(segments[0].len(), 10);
    }

    #[test]
    fn partition_prefers_laps() {
        let set = set_with("distance", StreamChannel::Numeric(vec![0.0, 2_500.0]));
        let segments = partition(&set, &[lap(0, 1)]);
        assert_eq!(segments[0].label, "Lap 1");
    }

    #[test]
    fn comparison_identifies_extremes() {
        let mut velocity = vec![5.0; 100]; // steady
        velocity.extend((0..100).map(|i| 8.0 + if i % 2 == 0 { 1.0 } else { -1.0 })); // fast, ragged
        velocity.extend(vec![3.0; 100]); // slow, steady
        let set = set_with("velocity_smooth", StreamChannel::Numeric(velocity));
        let segments = vec![
            Segment { label: "Lap 1".into(), start: 0, end: 100 },
            Segment { label: "Lap 2".into(), start: 100, end: 200 },
            Segment { label: "Lap 3".into(), start: 200, end: 300 },
        ];
        let cmp = compare_segments(&set, &segments).unwrap();
        assert_eq!(cmp.fastest, "Lap 2");
        assert_eq!(cmp.slowest, "Lap 3");
        // Laps 1 and 3 are perfectly steady (cv 0); either is acceptable,
        // but lap 2 must not win consistency.
        assert_ne!(cmp.most_consistent, "Lap 2");
    }

    #[test]
    fn comparison_needs_two_segments() {
        let set = set_with("velocity_smooth", StreamChannel::Numeric(vec![5.0; 10]));
        let one = vec![Segment { label: "Lap 1".into(), start: 0, end: 10 }];
        assert!(compare_segments(&set, &one).is_none());
    }
}
