//! Size gate: token estimation and the auto-mode options menu.

use pl_domain::config::StreamsConfig;

/// Estimated token cost of a rendered string.
pub fn estimate_tokens(chars: usize, ratio: f64) -> u32 {
    (chars as f64 * ratio).ceil() as u32
}

/// The usable budget after the safety margin.
pub fn usable_budget(cfg: &StreamsConfig) -> u32 {
    cfg.max_context_tokens
        .saturating_sub(cfg.context_safety_margin)
}

/// Whether a rendered result fits the budget.
pub fn fits(text: &str, cfg: &StreamsConfig) -> bool {
    estimate_tokens(text.chars().count(), cfg.token_per_char_ratio) <= usable_budget(cfg)
}

/// The menu returned in `auto` mode when the raw dataset exceeds the
/// budget. Lists each processing option with its token estimate so the
/// model can pick one and re-invoke the tool — no model call happens here.
pub fn options_menu(
    activity_label: &str,
    sample_count: usize,
    raw_token_estimate: u32,
    cfg: &StreamsConfig,
) -> String {
    let budget = usable_budget(cfg);
    let per_sample = raw_token_estimate as f64 / sample_count.max(1) as f64;
    let default_page_tokens = (per_sample * cfg.default_page_size as f64).ceil() as u32;
    let total_pages = sample_count.div_ceil(cfg.default_page_size as usize).max(1);

    let mut out = format!(
        "## 📊 Dataset Too Large: {activity_label}\n\n\
         This stream set has **{sample_count} samples** — roughly \
         **{raw_token_estimate} tokens** raw, against a working budget of \
         **{budget} tokens**. Choose how to proceed and call the tool again:\n\n"
    );
    out.push_str(&format!(
        "- **derived** — lap-partitioned statistics and whole-activity \
         features (≈{DERIVED_TOKEN_ESTIMATE} tokens). Best default for \
         pacing, effort, and trend questions.\n"
    ));
    out.push_str(&format!(
        "- **ai-summary** — a prose summary of the full data driven by your \
         `summary_prompt` (≈{SUMMARY_TOKEN_ESTIMATE} tokens). Best for \
         open-ended \"what happened here\" questions.\n"
    ));
    out.push_str(&format!(
        "- **raw** with `page_size = {}` — the exact samples, \
         {total_pages} page(s) at ≈{default_page_tokens} tokens each. Best \
         when precise values matter.\n",
        cfg.default_page_size
    ));
    if sample_count > cfg.large_dataset_threshold as usize {
        out.push_str(
            "\nThis is a large recording; derived statistics are usually the \
             fastest route to a useful answer.\n",
        );
    }
    out
}

/// Nominal token cost quoted for derived output.
pub const DERIVED_TOKEN_ESTIMATE: u32 = 1_500;
/// Nominal token cost quoted for an ai-summary reply.
pub const SUMMARY_TOKEN_ESTIMATE: u32 = 600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(0, 0.25), 0);
        assert_eq!(estimate_tokens(1, 0.25), 1);
        assert_eq!(estimate_tokens(4, 0.25), 1);
        assert_eq!(estimate_tokens(5, 0.25), 2);
    }

    #[test]
    fn usable_budget_subtracts_margin() {
        let cfg = StreamsConfig::default();
        assert_eq!(usable_budget(&cfg), 13_000);
    }

    #[test]
    fn fits_respects_budget() {
        let cfg = StreamsConfig {
            max_context_tokens: 100,
            context_safety_margin: 0,
            token_per_char_ratio: 0.25,
            ..StreamsConfig::default()
        };
        assert!(fits(&"x".repeat(400), &cfg));
        assert!(!fits(&"x".repeat(401), &cfg));
    }

    #[test]
    fn menu_quotes_every_mode_with_estimates() {
        let cfg = StreamsConfig::default();
        let menu = options_menu("Activity 42", 9_000, 36_000, &cfg);
        assert!(menu.contains("9000 samples"));
        assert!(menu.contains("36000 tokens"));
        assert!(menu.contains("derived"));
        assert!(menu.contains("ai-summary"));
        assert!(menu.contains("page_size = 1000"));
        assert!(menu.contains("9 page(s)"));
        // 36000 tokens / 9000 samples * 1000 per page.
        assert!(menu.contains("4000 tokens each"));
        // Above the large-dataset threshold.
        assert!(menu.contains("large recording"));
    }

    #[test]
    fn menu_small_dataset_skips_large_note() {
        let cfg = StreamsConfig::default();
        let menu = options_menu("Activity 42", 1_500, 20_000, &cfg);
        assert!(!menu.contains("large recording"));
    }
}
