//! Coaching-voiced status lines shown between tool rounds.
//!
//! Only these phrases ever reach the client — never tool names, API
//! verbs, or provider identifiers. One line per round, chosen from the
//! round's first tool call (deterministic after the call_id sort).

use pl_domain::tool::ToolCall;

pub const REVIEWING_TRAINING: &str = "Reviewing your recent training…";
pub const ANALYZING_WORKOUT: &str = "Analyzing your workout data…";
pub const LOOKING_AT_TRENDS: &str = "Looking at your performance trends…";
pub const UPDATING_NOTES: &str = "Updating your training notes…";

/// The phrase for one tool.
pub fn phrase_for(tool_name: &str) -> &'static str {
    match tool_name {
        "get-recent-activities" => REVIEWING_TRAINING,
        "get-activity-details" | "get-activity-streams" => ANALYZING_WORKOUT,
        "get-athlete-profile" => LOOKING_AT_TRENDS,
        "update-athlete-logbook" => UPDATING_NOTES,
        _ => ANALYZING_WORKOUT,
    }
}

/// The status line for a round of calls (already sorted by call_id).
pub fn for_round(calls: &[ToolCall]) -> &'static str {
    calls
        .first()
        .map(|c| phrase_for(&c.name))
        .unwrap_or(ANALYZING_WORKOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str) -> ToolCall {
        ToolCall {
            call_id: "c1".into(),
            name: name.into(),
            arguments: serde_json::json!({}),
        }
    }

    #[test]
    fn every_tool_has_a_coaching_phrase() {
        for name in [
            "get-athlete-profile",
            "get-recent-activities",
            "get-activity-details",
            "get-activity-streams",
            "update-athlete-logbook",
        ] {
            let phrase = phrase_for(name);
            assert!(phrase.ends_with('…'));
            // No leaked mechanics.
            for forbidden in ["tool", "API", "function", "http", "GET", "POST"] {
                assert!(
                    !phrase.contains(forbidden),
                    "phrase {phrase:?} leaks {forbidden:?}"
                );
            }
        }
    }

    #[test]
    fn round_uses_first_call() {
        let calls = vec![call("update-athlete-logbook"), call("get-recent-activities")];
        assert_eq!(for_round(&calls), UPDATING_NOTES);
        assert_eq!(for_round(&[]), ANALYZING_WORKOUT);
    }
}
