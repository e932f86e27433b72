//! The size-gated mode dispatcher.
//!
//! `auto` renders raw when it fits and otherwise returns an options menu
//! without another model call. `raw` paginates; `derived` computes
//! lap-partitioned statistics and whole-activity features; `ai-summary`
//! delegates to a secondary model and falls back to `derived` on failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pl_domain::config::StreamsConfig;
use pl_domain::error::{Error, Result};
use pl_providers::LlmClient;
use pl_strava::types::{Lap, StreamSet};

use crate::derived::{
    self, elevation_gain_loss, heart_rate_drift, inflection_points, normalized_power, spikes,
    trend,
};
use crate::gate;
use crate::laps::{compare_segments, distance_segments, partition, Segment};
use crate::paginate::{self, PageOutcome};
use crate::stats::{boolean_stats, latlng_stats, numeric_stats};
use crate::summary;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    Auto,
    Raw,
    Derived,
    AiSummary,
}

/// One processing request, already validated by the tool dispatcher.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// Human-facing label used in headings ("Morning Ride (id 7)").
    pub activity_label: String,
    pub mode: ProcessingMode,
    /// 1-indexed page. `None` means page 1 when pagination applies.
    pub page_number: Option<usize>,
    /// Positive = page size; negative = request the full dataset;
    /// `None` = mode default.
    pub page_size: Option<i64>,
    /// Required for [`ProcessingMode::AiSummary`].
    pub summary_prompt: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Processor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StreamProcessor {
    cfg: StreamsConfig,
    /// Secondary model for `ai-summary`. `None` degrades that mode to
    /// `derived`.
    summarizer: Option<Arc<dyn LlmClient>>,
}

impl StreamProcessor {
    pub fn new(cfg: StreamsConfig, summarizer: Option<Arc<dyn LlmClient>>) -> Self {
        Self { cfg, summarizer }
    }

    /// Transform one stream set into markdown per the requested mode.
    pub async fn process(
        &self,
        set: &StreamSet,
        laps: &[Lap],
        req: &ProcessRequest,
    ) -> Result<String> {
        if set.sample_count() == 0 {
            return Ok(format!(
                "## 📊 Stream Analysis: {}\n\nNo stream data was recorded for this activity.\n",
                req.activity_label
            ));
        }

        match req.mode {
            ProcessingMode::Auto => Ok(self.process_auto(set, req)),
            ProcessingMode::Raw => Ok(self.process_raw(set, laps, req)),
            ProcessingMode::Derived => Ok(self.process_derived(set, laps, req)),
            ProcessingMode::AiSummary => self.process_summary(set, laps, req).await,
        }
    }

    // ── auto ──────────────────────────────────────────────────────

    fn process_auto(&self, set: &StreamSet, req: &ProcessRequest) -> String {
        let raw = render_raw(set, None, &req.activity_label);
        if gate::fits(&raw, &self.cfg) {
            return raw;
        }
        let estimate = gate::estimate_tokens(raw.chars().count(), self.cfg.token_per_char_ratio);
        tracing::info!(
            activity = %req.activity_label,
            samples = set.sample_count(),
            estimated_tokens = estimate,
            "raw stream exceeds budget, returning options menu"
        );
        gate::options_menu(&req.activity_label, set.sample_count(), estimate, &self.cfg)
    }

    // ── raw ───────────────────────────────────────────────────────

    fn process_raw(&self, set: &StreamSet, laps: &[Lap], req: &ProcessRequest) -> String {
        if let Some(size) = positive_page_size(req.page_size, &self.cfg) {
            let number = req.page_number.unwrap_or(1);
            return match paginate::paginate(set, number, size) {
                PageOutcome::OutOfRange {
                    requested,
                    total_pages,
                } => paginate::out_of_range_message(requested, total_pages),
                PageOutcome::Page(page) => {
                    let mut out = paginate::page_header(&page, set);
                    out.push('\n');
                    out.push_str(&render_raw(
                        &page.slice,
                        Some(page.start),
                        &req.activity_label,
                    ));
                    out
                }
            };
        }

        // Full dataset requested (page_size < 0 or omitted): re-gate.
        let raw = render_raw(set, None, &req.activity_label);
        if gate::fits(&raw, &self.cfg) {
            return raw;
        }

        let derived = self.render_derived_full(set, laps, &req.activity_label);
        if gate::fits(&derived, &self.cfg) {
            return format!(
                "_The full raw dataset exceeds the context budget; switched to \
                 derived statistics instead._\n\n{derived}"
            );
        }

        // Even derived is too big: derived over the first default-size page.
        let size = self.cfg.default_page_size as usize;
        let fallback = self
            .derived_first_page(set, &req.activity_label)
            .unwrap_or(derived);
        format!(
            "_The full raw dataset exceeds the context budget even as derived \
             statistics; falling back to derived statistics over page 1 \
             (page size {size})._\n\n{fallback}"
        )
    }

    // ── derived ───────────────────────────────────────────────────

    fn process_derived(&self, set: &StreamSet, laps: &[Lap], req: &ProcessRequest) -> String {
        if let Some(size) = positive_page_size(req.page_size, &self.cfg) {
            let number = req.page_number.unwrap_or(1);
            return match paginate::paginate(set, number, size) {
                PageOutcome::OutOfRange {
                    requested,
                    total_pages,
                } => paginate::out_of_range_message(requested, total_pages),
                PageOutcome::Page(page) => {
                    let mut out = paginate::page_header(&page, set);
                    out.push('\n');
                    out.push_str(&self.render_derived_page(&page.slice, &req.activity_label));
                    out
                }
            };
        }

        // Full-activity derived output is size-gated too: a long activity
        // with many laps and channels can overflow on statistics alone.
        let derived = self.render_derived_full(set, laps, &req.activity_label);
        if gate::fits(&derived, &self.cfg) {
            return derived;
        }
        let size = self.cfg.default_page_size as usize;
        let fallback = self
            .derived_first_page(set, &req.activity_label)
            .unwrap_or(derived);
        format!(
            "_Derived statistics over the full activity exceed the context \
             budget; falling back to derived statistics over page 1 \
             (page size {size})._\n\n{fallback}"
        )
    }

    // ── ai-summary ────────────────────────────────────────────────

    async fn process_summary(
        &self,
        set: &StreamSet,
        laps: &[Lap],
        req: &ProcessRequest,
    ) -> Result<String> {
        let prompt = match req.summary_prompt.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => p,
            None => {
                return Err(Error::SchemaViolation(
                    "summary_prompt is required when processing_mode is \"ai-summary\"".into(),
                ))
            }
        };

        let llm = match &self.summarizer {
            Some(llm) => llm.clone(),
            None => {
                tracing::warn!("no summarizer configured; degrading ai-summary to derived");
                return Ok(self.derived_fallback(set, laps, req, "no summarization model is configured"));
            }
        };

        let serialized = render_raw(set, None, &req.activity_label);
        match summary::summarize(llm.as_ref(), &req.activity_label, &serialized, prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(error = %e, "summarization failed, falling back to derived");
                Ok(self.derived_fallback(set, laps, req, "the summarization call failed"))
            }
        }
    }

    fn derived_fallback(
        &self,
        set: &StreamSet,
        laps: &[Lap],
        req: &ProcessRequest,
        reason: &str,
    ) -> String {
        format!(
            "_Summary unavailable ({reason}); showing derived statistics instead._\n\n{}",
            self.render_derived_full(set, laps, &req.activity_label)
        )
    }

    // ── derived rendering ─────────────────────────────────────────

    fn render_derived_full(&self, set: &StreamSet, laps: &[Lap], label: &str) -> String {
        let segments = partition(set, laps);
        render_derived(set, &segments, label, self.cfg.spike_stdev_factor)
    }

    /// Derived output for a page slice: lap indices no longer line up with
    /// the sliced samples, so partitioning falls back to distance segments.
    fn render_derived_page(&self, slice: &StreamSet, label: &str) -> String {
        let segments = distance_segments(slice, 1_000.0);
        render_derived(slice, &segments, label, self.cfg.spike_stdev_factor)
    }

    /// Page 1 of the default page size, rendered as derived statistics
    /// with the pagination header. Used when full-activity derived output
    /// itself exceeds the budget. `None` when even page 1 is out of range.
    fn derived_first_page(&self, set: &StreamSet, label: &str) -> Option<String> {
        let size = self.cfg.default_page_size as usize;
        match paginate::paginate(set, 1, size) {
            PageOutcome::Page(page) => {
                let mut out = paginate::page_header(&page, set);
                out.push('\n');
                out.push_str(&self.render_derived_page(&page.slice, label));
                Some(out)
            }
            PageOutcome::OutOfRange { .. } => None,
        }
    }
}

/// Positive page size, clamped to the configured maximum. `None` for
/// negative (= full dataset) or absent sizes.
fn positive_page_size(page_size: Option<i64>, cfg: &StreamsConfig) -> Option<usize> {
    match page_size {
        Some(size) if size > 0 => Some((size as usize).min(cfg.max_page_size as usize)),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Raw rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compact markdown table of the sample values. `index_offset` makes row
/// indices absolute when rendering a page slice.
fn render_raw(set: &StreamSet, index_offset: Option<usize>, label: &str) -> String {
    use pl_strava::types::StreamChannel;

    let offset = index_offset.unwrap_or(0);
    let keys: Vec<&String> = set.channels.keys().collect();
    let rows = set.sample_count();

    let mut out = format!("## 📊 Stream Data: {label}\n\n");
    out.push_str(&format!("{rows} samples × {} channels\n\n", keys.len()));

    out.push('|');
    out.push_str(" # |");
    for key in &keys {
        let unit = channel_unit(key);
        if unit.is_empty() {
            out.push_str(&format!(" {key} |"));
        } else {
            out.push_str(&format!(" {key} ({unit}) |"));
        }
    }
    out.push('\n');
    out.push('|');
    for _ in 0..=keys.len() {
        out.push_str("---|");
    }
    out.push('\n');

    for row in 0..rows {
        out.push_str(&format!("| {} |", row + offset));
        for key in &keys {
            let cell = match &set.channels[*key] {
                StreamChannel::Numeric(v) => v
                    .get(row)
                    .filter(|x| x.is_finite())
                    .map(|x| fmt_num(*x))
                    .unwrap_or_else(|| "–".into()),
                StreamChannel::Boolean(v) => v
                    .get(row)
                    .map(|b| if *b { "t".into() } else { "f".into() })
                    .unwrap_or_else(|| "–".to_string()),
                StreamChannel::LatLng(v) => v
                    .get(row)
                    .map(|p| format!("{:.5},{:.5}", p[0], p[1]))
                    .unwrap_or_else(|| "–".into()),
            };
            out.push_str(&format!(" {cell} |"));
        }
        out.push('\n');
    }

    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Derived rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Channels excluded from spike/inflection/trend reporting (monotonic
/// counters spike by construction).
const COUNTER_CHANNELS: [&str; 2] = ["time", "distance"];

fn render_derived(set: &StreamSet, segments: &[Segment], label: &str, spike_k: f64) -> String {
    use pl_strava::types::StreamChannel;

    let mut out = format!("## 📊 Stream Analysis: {label}\n\n");
    out.push_str(&format!(
        "- **Samples:** {}\n- **Channels:** {}\n\n",
        set.sample_count(),
        set.channels
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    ));

    // ── Per-segment statistics ────────────────────────────────────
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "### 📊 {} (samples {}–{})\n\n",
            segment.label,
            segment.start,
            segment.end - 1
        ));
        let slice = set.slice(segment.start, segment.end);
        for (key, channel) in &slice.channels {
            match channel {
                StreamChannel::Numeric(values) => {
                    if let Some(stats) = numeric_stats(values) {
                        out.push_str(&stat_line(key, &stats));
                    }
                }
                StreamChannel::Boolean(values) => {
                    if let Some(stats) = boolean_stats(values) {
                        out.push_str(&format!(
                            "- **{key}:** moving {} ({:.0}%), stopped {} ({:.0}%)\n",
                            stats.true_count,
                            stats.true_pct(),
                            stats.false_count,
                            stats.false_pct()
                        ));
                    }
                }
                StreamChannel::LatLng(points) => {
                    if let Some(stats) = latlng_stats(points) {
                        out.push_str(&format!(
                            "- **{key}:** {} points, start {:.5},{:.5} → end {:.5},{:.5}, \
                             bounds lat [{:.5}, {:.5}] lng [{:.5}, {:.5}]\n",
                            stats.count,
                            stats.start[0],
                            stats.start[1],
                            stats.end[0],
                            stats.end[1],
                            stats.min_lat,
                            stats.max_lat,
                            stats.min_lng,
                            stats.max_lng
                        ));
                    }
                }
            }
        }
        out.push('\n');
    }

    // ── Whole-activity features ───────────────────────────────────
    out.push_str("### 📊 Whole-Activity Features\n\n");

    if let Some(altitude) = set.numeric("altitude") {
        let (gain, loss) = elevation_gain_loss(altitude);
        out.push_str(&format!(
            "- **Elevation:** +{gain:.0} m gained, -{loss:.0} m lost\n"
        ));
    }
    if let Some(watts) = set.numeric("watts") {
        if let Some(np) = normalized_power(watts) {
            out.push_str(&format!("- ⚡ **Normalized power:** {np:.0} W\n"));
        }
    }
    if let (Some(time), Some(hr)) = (set.numeric("time"), set.numeric("heartrate")) {
        if let Some(drift) = heart_rate_drift(time, hr) {
            out.push_str(&format!("- 💓 **Heart-rate drift:** {drift:+.1} bpm/hour\n"));
        }
    }

    for (key, channel) in &set.channels {
        if COUNTER_CHANNELS.contains(&key.as_str()) {
            continue;
        }
        let StreamChannel::Numeric(values) = channel else {
            continue;
        };
        let found = spikes(values, spike_k);
        if !found.is_empty() {
            let preview: Vec<String> = found.iter().take(5).map(|i| i.to_string()).collect();
            let suffix = if found.len() > 5 { ", …" } else { "" };
            out.push_str(&format!(
                "- **{key} spikes** (> mean + {spike_k:.1}·σ): {} at samples {}{suffix}\n",
                found.len(),
                preview.join(", ")
            ));
        }
        let points = inflection_points(values);
        if !points.is_empty() {
            out.push_str(&format!(
                "- **{key} inflection points:** {} significant gradient reversals\n",
                points.len()
            ));
        }
        if let Some((direction, change)) = trend(values, derived::NP_WINDOW) {
            let unit = channel_unit(key);
            out.push_str(&format!(
                "- **{key} trend:** {} ({change:+.1} {unit} over the activity)\n",
                direction.label()
            ));
        }
    }

    let correlation_pairs = [
        ("heartrate", "watts"),
        ("heartrate", "velocity_smooth"),
        ("cadence", "velocity_smooth"),
        ("watts", "velocity_smooth"),
    ];
    for (a, b) in correlation_pairs {
        if let (Some(va), Some(vb)) = (set.numeric(a), set.numeric(b)) {
            if let Some(r) = derived::correlation(va, vb) {
                out.push_str(&format!("- **Correlation {a} ↔ {b}:** r = {r:.2}\n"));
            }
        }
    }

    // ── Segment comparison ────────────────────────────────────────
    if let Some(cmp) = compare_segments(set, segments) {
        out.push('\n');
        out.push_str("### 📊 Segment Comparison\n\n");
        out.push_str(&format!(
            "- **Fastest:** {} ({:.1} km/h average)\n",
            cmp.fastest,
            cmp.fastest_speed * 3.6
        ));
        out.push_str(&format!(
            "- **Slowest:** {} ({:.1} km/h average)\n",
            cmp.slowest,
            cmp.slowest_speed * 3.6
        ));
        out.push_str(&format!(
            "- **Most consistent:** {} (speed cv {:.2})\n",
            cmp.most_consistent, cmp.most_consistent_cv
        ));
    }

    out
}

fn stat_line(key: &str, stats: &crate::stats::ChannelStats) -> String {
    let glyph = channel_glyph(key);
    let unit = channel_unit(key);
    let unit_suffix = if unit.is_empty() {
        String::new()
    } else {
        format!(" {unit}")
    };
    format!(
        "- {glyph} **{key}**: min {}{u}, max {}{u}, mean {}{u}, median {}{u}, \
         σ {}, cv {:.2}, range {}{u}, q25 {}{u}, q75 {}{u}, n={}\n",
        fmt_num(stats.min),
        fmt_num(stats.max),
        fmt_num(stats.mean),
        fmt_num(stats.median),
        fmt_num(stats.stdev),
        stats.cv,
        fmt_num(stats.range),
        fmt_num(stats.q25),
        fmt_num(stats.q75),
        stats.count,
        u = unit_suffix,
    )
}

fn channel_unit(key: &str) -> &'static str {
    match key {
        "time" => "s",
        "distance" => "m",
        "altitude" => "m",
        "velocity_smooth" => "m/s",
        "heartrate" => "bpm",
        "cadence" => "rpm",
        "watts" => "W",
        "temp" => "°C",
        "grade_smooth" => "%",
        _ => "",
    }
}

fn channel_glyph(key: &str) -> &'static str {
    match key {
        "heartrate" => "💓",
        "watts" => "⚡",
        _ => "📊",
    }
}

/// Compact numeric formatting: integers stay integers, the rest keep one
/// decimal.
fn fmt_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.1}")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use pl_domain::stream::{BoxStream, LlmEvent};
    use pl_providers::{ChatRequest, ChatResponse};
    use pl_strava::types::StreamChannel;
    use std::collections::BTreeMap;

    fn request(mode: ProcessingMode) -> ProcessRequest {
        ProcessRequest {
            activity_label: "Morning Ride (id 9)".into(),
            mode,
            page_number: None,
            page_size: None,
            summary_prompt: None,
        }
    }

    fn small_set() -> StreamSet {
        let mut channels = BTreeMap::new();
        channels.insert(
            "time".to_string(),
            StreamChannel::Numeric((0..10).map(|i| i as f64).collect()),
        );
        channels.insert(
            "heartrate".to_string(),
            StreamChannel::Numeric((0..10).map(|i| 140.0 + i as f64).collect()),
        );
        StreamSet { channels }
    }

    fn big_set(samples: usize) -> StreamSet {
        let mut channels = BTreeMap::new();
        channels.insert(
            "time".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| i as f64).collect()),
        );
        channels.insert(
            "distance".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| i as f64 * 8.0).collect()),
        );
        channels.insert(
            "velocity_smooth".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| 7.0 + (i % 7) as f64 * 0.2).collect()),
        );
        channels.insert(
            "heartrate".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| 135.0 + (i % 25) as f64).collect()),
        );
        StreamSet { channels }
    }

    fn processor() -> StreamProcessor {
        StreamProcessor::new(StreamsConfig::default(), None)
    }

    #[tokio::test]
    async fn empty_set_reports_no_data_for_every_mode() {
        let processor = processor();
        let empty = StreamSet::default();
        for mode in [
            ProcessingMode::Auto,
            ProcessingMode::Raw,
            ProcessingMode::Derived,
        ] {
            let out = processor.process(&empty, &[], &request(mode)).await.unwrap();
            assert!(out.contains("No stream data"), "mode {mode:?}: {out}");
        }
    }

    #[tokio::test]
    async fn auto_small_dataset_returns_raw() {
        let out = processor()
            .process(&small_set(), &[], &request(ProcessingMode::Auto))
            .await
            .unwrap();
        assert!(out.contains("## 📊 Stream Data"));
        assert!(out.contains("| # |"));
    }

    #[tokio::test]
    async fn auto_big_dataset_returns_options_menu() {
        let out = processor()
            .process(&big_set(9_000), &[], &request(ProcessingMode::Auto))
            .await
            .unwrap();
        assert!(out.contains("Dataset Too Large"));
        assert!(out.contains("derived"));
        assert!(out.contains("ai-summary"));
        assert!(out.contains("page_size"));
    }

    #[tokio::test]
    async fn raw_pagination_has_header_and_absolute_indices() {
        let mut req = request(ProcessingMode::Raw);
        req.page_number = Some(2);
        req.page_size = Some(1_000);
        let out = processor()
            .process(&big_set(2_500), &[], &req)
            .await
            .unwrap();
        assert!(out.contains("Page 2 of 3"));
        assert!(out.contains("Reach conclusions"));
        assert!(out.contains("| 1000 |"));
        assert!(!out.contains("| 2000 |"));
    }

    #[tokio::test]
    async fn raw_page_past_end_names_total_pages() {
        let mut req = request(ProcessingMode::Raw);
        req.page_number = Some(9);
        req.page_size = Some(1_000);
        let out = processor()
            .process(&big_set(2_500), &[], &req)
            .await
            .unwrap();
        assert_eq!(out, "No such page (9); total pages = 3.");
    }

    #[tokio::test]
    async fn raw_full_request_on_huge_set_falls_back_to_derived() {
        let mut req = request(ProcessingMode::Raw);
        req.page_size = Some(-1);
        let out = processor()
            .process(&big_set(9_000), &[], &req)
            .await
            .unwrap();
        assert!(out.contains("exceeds the context budget"));
        assert!(out.contains("Stream Analysis"));
    }

    /// Many channels over many samples: heavy enough that even derived
    /// statistics overflow the default budget once segment count climbs.
    fn laden_set(samples: usize) -> StreamSet {
        let mut channels = BTreeMap::new();
        channels.insert(
            "time".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| i as f64).collect()),
        );
        channels.insert(
            "distance".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| i as f64 * 8.0).collect()),
        );
        channels.insert(
            "altitude".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| 200.0 + (i % 50) as f64).collect()),
        );
        channels.insert(
            "velocity_smooth".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| 7.0 + (i % 7) as f64 * 0.2).collect()),
        );
        channels.insert(
            "heartrate".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| 135.0 + (i % 25) as f64).collect()),
        );
        channels.insert(
            "cadence".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| 85.0 + (i % 10) as f64).collect()),
        );
        channels.insert(
            "watts".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| 180.0 + (i % 60) as f64).collect()),
        );
        channels.insert(
            "temp".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| 18.0 + (i % 4) as f64).collect()),
        );
        StreamSet { channels }
    }

    fn many_laps(samples: usize, lap_len: usize) -> Vec<Lap> {
        (0..samples / lap_len)
            .map(|i| Lap {
                start_index: i * lap_len,
                end_index: (i + 1) * lap_len - 1,
                ..Lap::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn derived_full_request_exceeding_budget_paginates_with_annotation() {
        // 80 laps × 8 channels of per-segment statistics overflow the
        // default budget even without any raw samples in the output.
        let laps = many_laps(8_000, 100);
        let out = processor()
            .process(&laden_set(8_000), &laps, &request(ProcessingMode::Derived))
            .await
            .unwrap();
        assert!(out.contains("exceed the context budget"));
        assert!(out.contains("falling back to derived statistics over page 1"));
        assert!(out.contains("Page 1 of 8"));
        assert!(out.contains("Stream Analysis"));
        // The fallback itself must honor the budget it exists to protect.
        assert!(
            gate::fits(&out, &StreamsConfig::default()),
            "fallback output must fit the budget"
        );
    }

    #[tokio::test]
    async fn derived_negative_page_size_is_gated_like_omitted() {
        let laps = many_laps(8_000, 100);
        let mut req = request(ProcessingMode::Derived);
        req.page_size = Some(-1);
        let out = processor()
            .process(&laden_set(8_000), &laps, &req)
            .await
            .unwrap();
        assert!(out.contains("falling back to derived statistics over page 1"));
        assert!(out.contains("Page 1 of 8"));
    }

    #[tokio::test]
    async fn derived_partitions_by_laps_when_present() {
        let laps = vec![
            Lap {
                start_index: 0,
                end_index: 4,
                ..Lap::default()
            },
            Lap {
                start_index: 5,
                end_index: 9,
                ..Lap::default()
            },
        ];
        let out = processor()
            .process(&small_set(), &laps, &request(ProcessingMode::Derived))
            .await
            .unwrap();
        assert!(out.contains("### 📊 Lap 1 (samples 0–4)"));
        assert!(out.contains("### 📊 Lap 2 (samples 5–9)"));
        assert!(out.contains("💓 **heartrate**"));
        assert!(out.contains("bpm"));
    }

    #[tokio::test]
    async fn derived_single_sample_has_zero_spread() {
        let mut channels = BTreeMap::new();
        channels.insert(
            "heartrate".to_string(),
            StreamChannel::Numeric(vec![142.0]),
        );
        let set = StreamSet { channels };
        let out = processor()
            .process(&set, &[], &request(ProcessingMode::Derived))
            .await
            .unwrap();
        assert!(out.contains("σ 0"));
        assert!(out.contains("cv 0.00"));
        assert!(!out.contains("spikes"));
        assert!(!out.contains("inflection"));
    }

    #[tokio::test]
    async fn derived_omits_empty_channels() {
        let mut channels = BTreeMap::new();
        channels.insert(
            "heartrate".to_string(),
            StreamChannel::Numeric(vec![140.0, 150.0]),
        );
        channels.insert("watts".to_string(), StreamChannel::Numeric(vec![]));
        let set = StreamSet { channels };
        let out = processor()
            .process(&set, &[], &request(ProcessingMode::Derived))
            .await
            .unwrap();
        assert!(out.contains("**heartrate**"));
        assert!(!out.contains("**watts**:"), "empty channel must be omitted");
    }

    #[tokio::test]
    async fn ai_summary_without_prompt_is_schema_violation() {
        let err = processor()
            .process(&small_set(), &[], &request(ProcessingMode::AiSummary))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn ai_summary_without_summarizer_degrades_to_derived() {
        let mut req = request(ProcessingMode::AiSummary);
        req.summary_prompt = Some("how did pacing evolve?".into());
        let out = processor().process(&small_set(), &[], &req).await.unwrap();
        assert!(out.contains("Summary unavailable"));
        assert!(out.contains("Stream Analysis"));
    }

    struct ScriptedSummarizer {
        reply: std::result::Result<String, ()>,
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedSummarizer {
        async fn respond(&self, req: &ChatRequest) -> pl_domain::error::Result<ChatResponse> {
            match &self.reply {
                Ok(text) => {
                    // The full serialized data must reach the summarizer.
                    let user_text = req.messages.last().unwrap().content.extract_all_text();
                    assert!(user_text.contains("Complete stream data"));
                    Ok(ChatResponse {
                        content: text.clone(),
                        usage: None,
                    })
                }
                Err(()) => Err(Error::LlmUnavailable("down".into())),
            }
        }

        async fn stream(
            &self,
            _req: &ChatRequest,
        ) -> pl_domain::error::Result<BoxStream<'static, pl_domain::error::Result<LlmEvent>>>
        {
            unimplemented!("summaries never stream")
        }

        fn provider_id(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn ai_summary_returns_model_reply_verbatim() {
        let processor = StreamProcessor::new(
            StreamsConfig::default(),
            Some(Arc::new(ScriptedSummarizer {
                reply: Ok("Steady negative split with one surge.".into()),
            })),
        );
        let mut req = request(ProcessingMode::AiSummary);
        req.summary_prompt = Some("pacing?".into());
        let out = processor.process(&small_set(), &[], &req).await.unwrap();
        assert_eq!(out, "Steady negative split with one surge.");
    }

    #[tokio::test]
    async fn ai_summary_failure_falls_back_to_derived() {
        let processor = StreamProcessor::new(
            StreamsConfig::default(),
            Some(Arc::new(ScriptedSummarizer { reply: Err(()) })),
        );
        let mut req = request(ProcessingMode::AiSummary);
        req.summary_prompt = Some("pacing?".into());
        let out = processor.process(&small_set(), &[], &req).await.unwrap();
        assert!(out.contains("Summary unavailable"));
        assert!(out.contains("Stream Analysis"));
    }

    #[tokio::test]
    async fn raw_full_negative_equals_total_page_size_up_to_header() {
        let set = big_set(500);
        let mut by_negative = request(ProcessingMode::Raw);
        by_negative.page_size = Some(-1);
        let full = processor().process(&set, &[], &by_negative).await.unwrap();

        let mut by_exact = request(ProcessingMode::Raw);
        by_exact.page_size = Some(500);
        by_exact.page_number = Some(1);
        let paged = processor().process(&set, &[], &by_exact).await.unwrap();

        // Identical sample tables; the paged variant adds only the header.
        let table_start = paged.find("## 📊 Stream Data").unwrap();
        assert_eq!(full, paged[table_start..]);
    }

    #[test]
    fn processing_mode_serde_names() {
        assert_eq!(
            serde_json::to_string(&ProcessingMode::AiSummary).unwrap(),
            "\"ai-summary\""
        );
        let mode: ProcessingMode = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(mode, ProcessingMode::Auto);
    }
}
