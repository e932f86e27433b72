//! Markdown renderers for every Strava data shape.
//!
//! Tool results are always UTF-8 markdown: one level-2 heading naming the
//! subject, bullet blocks of key metrics with explicit units, and emoji
//! glyphs on section headers. Raw JSON never reaches the model.

use std::fmt::Write as _;

use crate::types::{
    ActivityZone, Athlete, AthleteZones, DetailedActivity, Lap, SummaryActivity, ZoneRanges,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Unit helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `5400` → `"1h 30m"`, `95` → `"1m 35s"`.
pub fn format_duration(total_secs: i64) -> String {
    let secs = total_secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Meters → `"40.0 km (24.9 mi)"`.
pub fn format_distance(meters: f64) -> String {
    let km = meters / 1000.0;
    let mi = km * 0.621_371;
    format!("{km:.1} km ({mi:.1} mi)")
}

/// Meters/second → `"26.7 km/h"`.
pub fn format_speed(mps: f64) -> String {
    format!("{:.1} km/h", mps * 3.6)
}

/// Meters/second → running pace `"4:39 /km"`.
pub fn format_pace(mps: f64) -> String {
    if mps <= 0.0 {
        return "–".into();
    }
    let secs_per_km = 1000.0 / mps;
    let m = (secs_per_km / 60.0).floor() as i64;
    let s = (secs_per_km % 60.0).round() as i64;
    format!("{m}:{s:02} /km")
}

/// Emoji for a sport type.
pub fn sport_glyph(sport_type: &str) -> &'static str {
    match sport_type {
        "Run" | "TrailRun" | "VirtualRun" => "🏃",
        "Ride" | "VirtualRide" | "GravelRide" | "MountainBikeRide" => "🚴",
        "Swim" => "🏊",
        "Hike" | "Walk" => "🥾",
        _ => "🏅",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Athlete profile
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn athlete_profile(athlete: &Athlete, zones: Option<&AthleteZones>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## 🏅 Athlete Profile: {}", athlete.full_name());
    let _ = writeln!(out);

    if let (Some(city), Some(country)) = (&athlete.city, &athlete.country) {
        let _ = writeln!(out, "- **Location:** {city}, {country}");
    }
    if let Some(weight) = athlete.weight {
        let _ = writeln!(out, "- **Weight:** {weight:.1} kg");
    }
    if let Some(ftp) = athlete.ftp {
        let _ = writeln!(out, "- **FTP:** {ftp:.0} W");
    }

    if let Some(zones) = zones {
        if let Some(hr) = &zones.heart_rate {
            let _ = writeln!(out);
            let _ = writeln!(out, "### 💓 Heart Rate Zones");
            let _ = writeln!(out);
            render_zone_ranges(&mut out, hr, "bpm");
        }
        if let Some(power) = &zones.power {
            let _ = writeln!(out);
            let _ = writeln!(out, "### ⚡ Power Zones");
            let _ = writeln!(out);
            render_zone_ranges(&mut out, power, "W");
        }
    }

    out
}

fn render_zone_ranges(out: &mut String, ranges: &ZoneRanges, unit: &str) {
    for (i, zone) in ranges.zones.iter().enumerate() {
        let label = if zone.max < 0 {
            format!("{}+ {unit}", zone.min)
        } else {
            format!("{}–{} {unit}", zone.min, zone.max)
        };
        let _ = writeln!(out, "- **Zone {}:** {label}", i + 1);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Activity list
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn activity_list(activities: &[SummaryActivity]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## 📊 Recent Activities ({})", activities.len());
    let _ = writeln!(out);

    if activities.is_empty() {
        let _ = writeln!(out, "No recorded activities in this range.");
        return out;
    }

    for activity in activities {
        let glyph = sport_glyph(&activity.sport_type);
        let _ = writeln!(
            out,
            "### {glyph} {} (id {})",
            activity.name, activity.id
        );
        if let Some(date) = &activity.start_date_local {
            let _ = writeln!(out, "- **Date:** {date}");
        }
        let _ = writeln!(out, "- **Distance:** {}", format_distance(activity.distance));
        let _ = writeln!(
            out,
            "- **Moving time:** {}",
            format_duration(activity.moving_time)
        );
        let _ = writeln!(
            out,
            "- **Elevation gain:** {:.0} m",
            activity.total_elevation_gain
        );
        if let Some(speed) = activity.average_speed {
            let _ = writeln!(
                out,
                "- **Avg speed:** {} ({})",
                format_speed(speed),
                format_pace(speed)
            );
        }
        if let Some(hr) = activity.average_heartrate {
            let _ = writeln!(out, "- **Avg heart rate:** {hr:.0} bpm");
        }
        if let Some(watts) = activity.average_watts {
            let _ = writeln!(out, "- **Avg power:** {watts:.0} W");
        }
        let _ = writeln!(out);
    }

    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Activity details
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn activity_details(detail: &DetailedActivity, zones: Option<&[ActivityZone]>) -> String {
    let summary = &detail.summary;
    let glyph = sport_glyph(&summary.sport_type);
    let mut out = String::new();

    let _ = writeln!(out, "## {glyph} {} (id {})", summary.name, summary.id);
    let _ = writeln!(out);
    if let Some(description) = detail.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "> {description}");
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "- **Distance:** {}", format_distance(summary.distance));
    let _ = writeln!(
        out,
        "- **Moving / elapsed:** {} / {}",
        format_duration(summary.moving_time),
        format_duration(summary.elapsed_time)
    );
    let _ = writeln!(
        out,
        "- **Elevation gain:** {:.0} m",
        summary.total_elevation_gain
    );
    if let Some(speed) = summary.average_speed {
        let _ = writeln!(
            out,
            "- **Avg speed:** {} ({})",
            format_speed(speed),
            format_pace(speed)
        );
    }
    if let Some(max) = detail.max_speed {
        let _ = writeln!(out, "- **Max speed:** {}", format_speed(max));
    }
    if let Some(hr) = summary.average_heartrate {
        let max = detail
            .max_heartrate
            .map(|m| format!(" (max {m:.0} bpm)"))
            .unwrap_or_default();
        let _ = writeln!(out, "- **Avg heart rate:** {hr:.0} bpm{max}");
    }
    if let Some(watts) = summary.average_watts {
        let weighted = detail
            .weighted_average_watts
            .map(|w| format!(" (weighted {w:.0} W)"))
            .unwrap_or_default();
        let _ = writeln!(out, "- **Avg power:** {watts:.0} W{weighted}");
    }
    if let Some(calories) = detail.calories {
        let _ = writeln!(out, "- **Calories:** {calories:.0} kcal");
    }

    if !detail.laps.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "### 📊 Laps ({})", detail.laps.len());
        let _ = writeln!(out);
        let _ = writeln!(out, "| Lap | Distance | Time | Avg speed | Avg HR |");
        let _ = writeln!(out, "|---|---|---|---|---|");
        for lap in &detail.laps {
            let _ = writeln!(out, "{}", lap_row(lap));
        }
    }

    if let Some(zones) = zones.filter(|z| !z.is_empty()) {
        for zone in zones {
            let (title, unit) = match zone.kind.as_str() {
                "heartrate" => ("### 💓 Time in Heart Rate Zones", "bpm"),
                "power" => ("### ⚡ Time in Power Zones", "W"),
                other => {
                    tracing::debug!(kind = other, "skipping unknown zone kind");
                    continue;
                }
            };
            let _ = writeln!(out);
            let _ = writeln!(out, "{title}");
            let _ = writeln!(out);
            let total: f64 = zone.distribution_buckets.iter().map(|b| b.time).sum();
            for (i, bucket) in zone.distribution_buckets.iter().enumerate() {
                let pct = if total > 0.0 {
                    bucket.time / total * 100.0
                } else {
                    0.0
                };
                let upper = if bucket.max <= 0.0 {
                    "+".to_string()
                } else {
                    format!("–{:.0}", bucket.max)
                };
                let _ = writeln!(
                    out,
                    "- **Zone {} ({:.0}{upper} {unit}):** {} ({pct:.0}%)",
                    i + 1,
                    bucket.min,
                    format_duration(bucket.time as i64),
                );
            }
        }
    }

    out
}

fn lap_row(lap: &Lap) -> String {
    let name = if lap.name.is_empty() {
        format!("Lap {}", lap.lap_index)
    } else {
        lap.name.clone()
    };
    let speed = lap
        .average_speed
        .map(format_speed)
        .unwrap_or_else(|| "–".into());
    let hr = lap
        .average_heartrate
        .map(|h| format!("{h:.0} bpm"))
        .unwrap_or_else(|| "–".into());
    format!(
        "| {name} | {} | {} | {speed} | {hr} |",
        format_distance(lap.distance),
        format_duration(lap.moving_time),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logbook confirmation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn logbook_confirmation(content_chars: usize) -> String {
    format!(
        "## 📒 Training Notes Updated\n\n- **Saved:** {content_chars} characters\n- \
         The updated notes will be available in every future conversation.\n"
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
