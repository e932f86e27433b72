//! Tool registry and dispatcher.
//!
//! Exactly five tools are exposed to the model. Arguments arrive as the
//! accumulated JSON buffer from the stream, get parsed strictly into typed
//! structs, and are validated before any executor runs. Every result is
//! markdown; every failure becomes a structured error string unless it is
//! `AuthRevoked`, which aborts the whole message.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use pl_domain::config::Config;
use pl_domain::error::{Error, Result};
use pl_domain::model::User;
use pl_domain::tool::{ToolCall, ToolDefinition};
use pl_strava::markdown;
use pl_strava::types::KNOWN_STREAM_KEYS;
use pl_streams::{ProcessRequest, ProcessingMode};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the tool definitions exposed to the LLM.
pub fn build_tool_definitions(config: &Config) -> Vec<ToolDefinition> {
    let mut defs = Vec::new();

    defs.push(ToolDefinition {
        name: "get-athlete-profile".into(),
        description: "Fetch the athlete's profile, including configured heart \
                      rate and power zones."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    });

    defs.push(ToolDefinition {
        name: "get-recent-activities".into(),
        description: "List the athlete's most recent activities with key metrics.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "per_page": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 100,
                    "description": "How many activities to fetch (default 10)"
                }
            },
            "additionalProperties": false
        }),
    });

    defs.push(ToolDefinition {
        name: "get-activity-details".into(),
        description: "Fetch one activity in detail: metrics, laps, and time-in-zone \
                      distribution."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "activity_id": { "type": "integer", "description": "Activity id" }
            },
            "required": ["activity_id"],
            "additionalProperties": false
        }),
    });

    defs.push(ToolDefinition {
        name: "get-activity-streams".into(),
        description: "Fetch an activity's recorded sample streams (heart rate, power, \
                      speed, …). Large datasets are size-gated: auto mode either returns \
                      the raw samples or a menu of processing options."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "activity_id": { "type": "integer", "description": "Activity id" },
                "stream_types": {
                    "type": "array",
                    "items": { "type": "string", "enum": KNOWN_STREAM_KEYS },
                    "description": "Channels to fetch; omit for all"
                },
                "resolution": {
                    "type": "string",
                    "enum": config.strava.resolutions,
                    "description": "Sampling resolution"
                },
                "processing_mode": {
                    "type": "string",
                    "enum": ["auto", "raw", "derived", "ai-summary"],
                    "description": "How to process the samples (default auto)"
                },
                "page_number": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "1-indexed page when paginating"
                },
                "page_size": {
                    "type": "integer",
                    "description": "Samples per page; negative requests the full dataset"
                },
                "summary_prompt": {
                    "type": "string",
                    "description": "Question for the summarization model \
                                    (required when processing_mode is \"ai-summary\")"
                }
            },
            "required": ["activity_id"],
            "allOf": [{
                "if": {
                    "properties": { "processing_mode": { "const": "ai-summary" } },
                    "required": ["processing_mode"]
                },
                "then": { "required": ["summary_prompt"] }
            }],
            "additionalProperties": false
        }),
    });

    defs.push(ToolDefinition {
        name: "update-athlete-logbook".into(),
        description: "Overwrite the athlete's training logbook with new content. \
                      Free-form text; structure it however serves future coaching."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "The full new logbook text" }
            },
            "required": ["content"],
            "additionalProperties": false
        }),
    });

    defs
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Argument structs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecentActivitiesArgs {
    #[serde(default = "d_per_page")]
    per_page: i64,
}

fn d_per_page() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActivityDetailsArgs {
    activity_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActivityStreamsArgs {
    activity_id: i64,
    #[serde(default)]
    stream_types: Vec<String>,
    #[serde(default = "d_resolution")]
    resolution: String,
    #[serde(default = "d_mode")]
    processing_mode: ProcessingMode,
    #[serde(default)]
    page_number: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
    #[serde(default)]
    summary_prompt: Option<String>,
}

fn d_resolution() -> String {
    "high".into()
}
fn d_mode() -> ProcessingMode {
    ProcessingMode::Auto
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogbookArgs {
    content: String,
}

fn parse_args<'a, T: Deserialize<'a>>(arguments: &'a Value) -> Result<T> {
    T::deserialize(arguments).map_err(|e| Error::SchemaViolation(e.to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one tool call under the configured timeout. Spawned by the turn
/// loop so that a panicking executor is isolated at the task boundary.
pub async fn dispatch_with_timeout(
    state: AppState,
    user_id: String,
    call: ToolCall,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, execute(&state, &user_id, &call)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "tool {} exceeded {}s",
            call.name,
            timeout.as_secs()
        ))),
    }
}

async fn execute(state: &AppState, user_id: &str, call: &ToolCall) -> Result<String> {
    // Always read the user fresh — a concurrent call may have refreshed
    // the credentials.
    let user = state
        .users
        .get(user_id)
        .await?
        .ok_or(Error::AuthRevoked)?;

    match call.name.as_str() {
        "get-athlete-profile" => {
            let _args: NoArgs = parse_args(&call.arguments)?;
            athlete_profile(state, &user).await
        }
        "get-recent-activities" => recent_activities(state, &user, &call.arguments).await,
        "get-activity-details" => activity_details(state, &user, &call.arguments).await,
        "get-activity-streams" => activity_streams(state, &user, &call.arguments).await,
        "update-athlete-logbook" => update_logbook(state, &user, &call.arguments).await,
        other => Err(Error::SchemaViolation(format!("unknown tool: {other}"))),
    }
}

/// The structured error string injected as a tool result when an executor
/// fails (everything except `AuthRevoked`, which aborts the message).
pub fn error_result(tool_name: &str, err: &Error) -> String {
    format!("tool {tool_name} failed: {}", err.coaching_voice())
}

// ── Executors ───────────────────────────────────────────────────────

async fn athlete_profile(state: &AppState, user: &User) -> Result<String> {
    let athlete = state.strava.athlete(user).await?;
    // Zone configuration is best-effort; absence is tolerated.
    let zones = match state.strava.athlete_zones(user).await {
        Ok(zones) => Some(zones),
        Err(Error::AuthRevoked) => return Err(Error::AuthRevoked),
        Err(e) => {
            tracing::debug!(error = %e, "athlete zones unavailable");
            None
        }
    };
    Ok(markdown::athlete_profile(&athlete, zones.as_ref()))
}

async fn recent_activities(state: &AppState, user: &User, arguments: &Value) -> Result<String> {
    let args: RecentActivitiesArgs = parse_args(arguments)?;
    if !(1..=100).contains(&args.per_page) {
        return Err(Error::SchemaViolation(format!(
            "per_page must be between 1 and 100 (got {})",
            args.per_page
        )));
    }
    let activities = state
        .strava
        .recent_activities(user, args.per_page as u32)
        .await?;
    Ok(markdown::activity_list(&activities))
}

async fn activity_details(state: &AppState, user: &User, arguments: &Value) -> Result<String> {
    let args: ActivityDetailsArgs = parse_args(arguments)?;
    let detail = state.strava.activity(user, args.activity_id).await?;
    let zones = match state.strava.activity_zones(user, args.activity_id).await {
        Ok(zones) => Some(zones),
        Err(Error::AuthRevoked) => return Err(Error::AuthRevoked),
        Err(e) => {
            tracing::debug!(error = %e, activity_id = args.activity_id, "activity zones unavailable");
            None
        }
    };
    Ok(markdown::activity_details(&detail, zones.as_deref()))
}

async fn activity_streams(state: &AppState, user: &User, arguments: &Value) -> Result<String> {
    let args: ActivityStreamsArgs = parse_args(arguments)?;

    if !state
        .config
        .strava
        .resolutions
        .iter()
        .any(|r| r == &args.resolution)
    {
        return Err(Error::SchemaViolation(format!(
            "resolution must be one of {:?} (got {:?})",
            state.config.strava.resolutions, args.resolution
        )));
    }
    for key in &args.stream_types {
        if !KNOWN_STREAM_KEYS.contains(&key.as_str()) {
            return Err(Error::SchemaViolation(format!(
                "unknown stream type {key:?}"
            )));
        }
    }
    if let Some(page) = args.page_number {
        if page < 1 {
            return Err(Error::SchemaViolation(format!(
                "page_number must be >= 1 (got {page})"
            )));
        }
    }
    if args.processing_mode == ProcessingMode::AiSummary
        && args.summary_prompt.as_deref().unwrap_or("").is_empty()
    {
        return Err(Error::SchemaViolation(
            "summary_prompt is required when processing_mode is \"ai-summary\"".into(),
        ));
    }

    let keys: Vec<String> = if args.stream_types.is_empty() {
        KNOWN_STREAM_KEYS.iter().map(|k| k.to_string()).collect()
    } else {
        args.stream_types.clone()
    };

    // The detail fetch supplies lap boundaries and the heading label.
    // Auth loss aborts; anything else degrades to lap-free analysis.
    let (label, laps) = match state.strava.activity(user, args.activity_id).await {
        Ok(detail) => (
            format!("{} (id {})", detail.summary.name, args.activity_id),
            detail.laps,
        ),
        Err(Error::AuthRevoked) => return Err(Error::AuthRevoked),
        Err(Error::NotFound(p)) => return Err(Error::NotFound(p)),
        Err(e) => {
            tracing::debug!(error = %e, "activity detail unavailable for lap partitioning");
            (format!("Activity {}", args.activity_id), Vec::new())
        }
    };

    let set = state
        .strava
        .activity_streams(user, args.activity_id, &keys, &args.resolution)
        .await?;

    let req = ProcessRequest {
        activity_label: label,
        mode: args.processing_mode,
        page_number: args.page_number.map(|p| p as usize),
        page_size: args.page_size,
        summary_prompt: args.summary_prompt,
    };
    state.streams.process(&set, &laps, &req).await
}

async fn update_logbook(state: &AppState, user: &User, arguments: &Value) -> Result<String> {
    let args: LogbookArgs = parse_args(arguments)?;
    state.logbooks.update(&user.id, &args.content).await?;
    Ok(markdown::logbook_confirmation(args.content.chars().count()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_exactly_the_five_tools() {
        let defs = build_tool_definitions(&Config::default());
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "get-athlete-profile",
                "get-recent-activities",
                "get-activity-details",
                "get-activity-streams",
                "update-athlete-logbook",
            ]
        );
    }

    #[test]
    fn streams_schema_expresses_conditional_summary_prompt() {
        let defs = build_tool_definitions(&Config::default());
        let streams = defs.iter().find(|d| d.name == "get-activity-streams").unwrap();
        let all_of = streams.parameters["allOf"].as_array().unwrap();
        let rule = &all_of[0];
        assert_eq!(
            rule["if"]["properties"]["processing_mode"]["const"],
            "ai-summary"
        );
        assert_eq!(rule["then"]["required"][0], "summary_prompt");
    }

    #[test]
    fn parse_args_strict_rejects_unknown_fields() {
        let err = parse_args::<RecentActivitiesArgs>(&serde_json::json!({
            "per_page": 5,
            "sort": "desc"
        }))
        .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn parse_args_applies_defaults() {
        let args: RecentActivitiesArgs = parse_args(&serde_json::json!({})).unwrap();
        assert_eq!(args.per_page, 10);

        let args: ActivityStreamsArgs =
            parse_args(&serde_json::json!({"activity_id": 12})).unwrap();
        assert_eq!(args.resolution, "high");
        assert_eq!(args.processing_mode, ProcessingMode::Auto);
        assert!(args.stream_types.is_empty());
    }

    #[test]
    fn parse_args_wrong_type_is_schema_violation() {
        let err =
            parse_args::<ActivityDetailsArgs>(&serde_json::json!({"activity_id": "seven"}))
                .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn error_result_is_structured_and_coached() {
        let text = error_result("get-activity-details", &Error::NotFound("x".into()));
        assert!(text.starts_with("tool get-activity-details failed:"));
        assert!(text.contains("deleted or"));
        assert!(!text.contains("404"));
    }
}
