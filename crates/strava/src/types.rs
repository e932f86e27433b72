//! Deserialization targets for the consumed Strava endpoints.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Athlete
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Athlete {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub ftp: Option<f64>,
}

impl Athlete {
    pub fn full_name(&self) -> String {
        match (&self.firstname, &self.lastname) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => self.username.clone().unwrap_or_else(|| "Athlete".into()),
        }
    }
}

/// Response of `/athlete/zones`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AthleteZones {
    #[serde(default)]
    pub heart_rate: Option<ZoneRanges>,
    #[serde(default)]
    pub power: Option<ZoneRanges>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneRanges {
    #[serde(default)]
    pub custom_zones: bool,
    #[serde(default)]
    pub zones: Vec<ZoneRange>,
}

/// One configured zone. Strava uses `-1` for an open-ended upper bound.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ZoneRange {
    pub min: i64,
    pub max: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Activities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryActivity {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sport_type: String,
    /// Meters.
    #[serde(default)]
    pub distance: f64,
    /// Seconds.
    #[serde(default)]
    pub moving_time: i64,
    /// Seconds.
    #[serde(default)]
    pub elapsed_time: i64,
    /// Meters.
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub start_date_local: Option<String>,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailedActivity {
    #[serde(flatten)]
    pub summary: SummaryActivity,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub max_watts: Option<f64>,
    #[serde(default)]
    pub weighted_average_watts: Option<f64>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub laps: Vec<Lap>,
}

/// One recorded lap. `start_index`/`end_index` are offsets into the
/// activity's stream sample arrays and drive lap partitioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lap {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lap_index: i64,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub end_index: usize,
    /// Seconds.
    #[serde(default)]
    pub elapsed_time: i64,
    /// Seconds.
    #[serde(default)]
    pub moving_time: i64,
    /// Meters.
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
}

/// One entry of `/activities/{id}/zones`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityZone {
    /// `"heartrate"` or `"power"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub distribution_buckets: Vec<ZoneBucket>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ZoneBucket {
    pub min: f64,
    pub max: f64,
    /// Seconds spent in this bucket.
    pub time: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streams
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stream keys the engine knows how to request and process.
pub const KNOWN_STREAM_KEYS: [&str; 11] = [
    "time",
    "distance",
    "altitude",
    "velocity_smooth",
    "heartrate",
    "cadence",
    "watts",
    "temp",
    "grade_smooth",
    "moving",
    "latlng",
];

/// Wire shape of one keyed stream from `/activities/{id}/streams?key_by_type=true`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStream {
    pub data: serde_json::Value,
    #[serde(default)]
    pub original_size: Option<usize>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// One decoded channel of a stream set.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChannel {
    /// Missing samples (JSON null) decode as NaN and are skipped by stats.
    Numeric(Vec<f64>),
    Boolean(Vec<bool>),
    /// `[lat, lng]` pairs.
    LatLng(Vec<[f64; 2]>),
}

impl StreamChannel {
    pub fn len(&self) -> usize {
        match self {
            StreamChannel::Numeric(v) => v.len(),
            StreamChannel::Boolean(v) => v.len(),
            StreamChannel::LatLng(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A time-aligned set of channels sampled during one activity.
///
/// Channels are kept in a sorted map so every iteration order downstream
/// (tables, statistics sections) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct StreamSet {
    pub channels: BTreeMap<String, StreamChannel>,
}

impl StreamSet {
    /// Decode the keyed wire map into typed channels. Unknown keys are kept
    /// as numeric when they decode; channels that fail to decode are
    /// dropped with a warning.
    pub fn from_wire(raw: HashMap<String, RawStream>) -> Self {
        let mut channels = BTreeMap::new();
        for (key, stream) in raw {
            let decoded = match key.as_str() {
                "moving" => decode_bools(&stream.data).map(StreamChannel::Boolean),
                "latlng" => decode_latlng(&stream.data).map(StreamChannel::LatLng),
                _ => decode_numeric(&stream.data).map(StreamChannel::Numeric),
            };
            match decoded {
                Some(channel) => {
                    channels.insert(key, channel);
                }
                None => {
                    tracing::warn!(key = %key, "dropping undecodable stream channel");
                }
            }
        }
        Self { channels }
    }

    /// Number of samples in the longest channel.
    pub fn sample_count(&self) -> usize {
        self.channels.values().map(StreamChannel::len).max().unwrap_or(0)
    }

    pub fn numeric(&self, key: &str) -> Option<&[f64]> {
        match self.channels.get(key) {
            Some(StreamChannel::Numeric(v)) => Some(v),
            _ => None,
        }
    }

    pub fn booleans(&self, key: &str) -> Option<&[bool]> {
        match self.channels.get(key) {
            Some(StreamChannel::Boolean(v)) => Some(v),
            _ => None,
        }
    }

    pub fn latlng(&self) -> Option<&[[f64; 2]]> {
        match self.channels.get("latlng") {
            Some(StreamChannel::LatLng(v)) => Some(v),
            _ => None,
        }
    }

    /// A sub-range of every channel (clamped per channel).
    pub fn slice(&self, start: usize, end: usize) -> StreamSet {
        let mut channels = BTreeMap::new();
        for (key, channel) in &self.channels {
            let sliced = match channel {
                StreamChannel::Numeric(v) => {
                    StreamChannel::Numeric(clamped(v, start, end).to_vec())
                }
                StreamChannel::Boolean(v) => {
                    StreamChannel::Boolean(clamped(v, start, end).to_vec())
                }
                StreamChannel::LatLng(v) => {
                    StreamChannel::LatLng(clamped(v, start, end).to_vec())
                }
            };
            channels.insert(key.clone(), sliced);
        }
        StreamSet { channels }
    }
}

fn clamped<T>(v: &[T], start: usize, end: usize) -> &[T] {
    let start = start.min(v.len());
    let end = end.clamp(start, v.len());
    &v[start..end]
}

fn decode_numeric(data: &serde_json::Value) -> Option<Vec<f64>> {
    let arr = data.as_array()?;
    Some(
        arr.iter()
            .map(|v| {
                if v.is_null() {
                    f64::NAN
                } else if let Some(f) = v.as_f64() {
                    f
                } else if let Some(b) = v.as_bool() {
                    // Tolerate servers typing `moving` samples into other keys.
                    if b {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    f64::NAN
                }
            })
            .collect(),
    )
}

fn decode_bools(data: &serde_json::Value) -> Option<Vec<bool>> {
    let arr = data.as_array()?;
    Some(arr.iter().map(|v| v.as_bool().unwrap_or(false)).collect())
}

fn decode_latlng(data: &serde_json::Value) -> Option<Vec<[f64; 2]>> {
    let arr = data.as_array()?;
    Some(
        arr.iter()
            .filter_map(|pair| {
                let pair = pair.as_array()?;
                Some([pair.first()?.as_f64()?, pair.get(1)?.as_f64()?])
            })
            .collect(),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OAuth token grant
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Response from `/oauth/token` for the refresh grant.
///
/// `Debug` is manually implemented to redact secrets.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) when `access_token` expires.
    pub expires_at: i64,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_set_decodes_typed_channels() {
        let mut raw = HashMap::new();
        raw.insert(
            "heartrate".to_string(),
            RawStream {
                data: serde_json::json!([120, null, 140]),
                original_size: Some(3),
                resolution: Some("high".into()),
            },
        );
        raw.insert(
            "moving".to_string(),
            RawStream {
                data: serde_json::json!([true, true, false]),
                original_size: None,
                resolution: None,
            },
        );
        raw.insert(
            "latlng".to_string(),
            RawStream {
                data: serde_json::json!([[48.85, 2.35], [48.86, 2.36]]),
                original_size: None,
                resolution: None,
            },
        );

        let set = StreamSet::from_wire(raw);
        let hr = set.numeric("heartrate").unwrap();
        assert_eq!(hr.len(), 3);
        assert!(hr[1].is_nan());
        assert_eq!(set.booleans("moving").unwrap(), &[true, true, false]);
        assert_eq!(set.latlng().unwrap().len(), 2);
        assert_eq!(set.sample_count(), 3);
    }

    #[test]
    fn slice_clamps_out_of_range() {
        let mut channels = BTreeMap::new();
        channels.insert(
            "watts".to_string(),
            StreamChannel::Numeric(vec![100.0, 110.0, 120.0]),
        );
        let set = StreamSet { channels };
        let sliced = set.slice(2, 10);
        assert_eq!(sliced.numeric("watts").unwrap(), &[120.0]);
        let empty = set.slice(5, 9);
        assert!(empty.numeric("watts").unwrap().is_empty());
    }

    #[test]
    fn token_grant_debug_is_redacted() {
        let grant: TokenGrant = serde_json::from_str(
            r#"{"access_token":"at-x","refresh_token":"rt-y","expires_at":5}"#,
        )
        .unwrap();
        let rendered = format!("{grant:?}");
        assert!(!rendered.contains("at-x"));
        assert!(!rendered.contains("rt-y"));
    }

    #[test]
    fn athlete_full_name_fallbacks() {
        let mut a = Athlete::default();
        assert_eq!(a.full_name(), "Athlete");
        a.username = Some("kom_hunter".into());
        assert_eq!(a.full_name(), "kom_hunter");
        a.firstname = Some("Jo".into());
        assert_eq!(a.full_name(), "Jo");
        a.lastname = Some("Rider".into());
        assert_eq!(a.full_name(), "Jo Rider");
    }

    #[test]
    fn detailed_activity_flattens_summary() {
        let json = serde_json::json!({
            "id": 9,
            "name": "Morning Ride",
            "sport_type": "Ride",
            "distance": 40000.0,
            "moving_time": 5400,
            "elapsed_time": 5600,
            "total_elevation_gain": 350.0,
            "laps": [{"name": "Lap 1", "start_index": 0, "end_index": 100}]
        });
        let detail: DetailedActivity = serde_json::from_value(json).unwrap();
        assert_eq!(detail.summary.name, "Morning Ride");
        assert_eq!(detail.laps.len(), 1);
        assert_eq!(detail.laps[0].end_index, 100);
    }
}
