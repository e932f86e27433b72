//! Wire the configuration into a running [`AppState`].

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use pl_domain::config::Config;
use pl_domain::model::User;
use pl_providers::{LlmClient, ResponsesProvider};
use pl_strava::StravaClient;
use pl_streams::StreamProcessor;
use pl_stores::file::{FileLogbookStore, FileSessionStore, FileUserStore};
use pl_stores::UserStore;

use crate::runtime::cancel::CancelMap;
use crate::state::AppState;

/// Build the full application state from config: file-backed stores, the
/// LLM adapter(s), the Strava client, and the stream processor.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let state_path = &config.stores.state_path;
    let users: Arc<dyn UserStore> =
        Arc::new(FileUserStore::new(state_path).context("opening user store")?);
    let sessions = Arc::new(FileSessionStore::new(state_path).context("opening session store")?);
    let logbooks = Arc::new(FileLogbookStore::new(state_path).context("opening logbook store")?);

    let coach_cfg = config
        .llm
        .for_role("coach")
        .context("no LLM provider configured — add one under [[llm.providers]]")?;
    let coach: Arc<dyn LlmClient> =
        Arc::new(ResponsesProvider::from_config(coach_cfg).context("building coach provider")?);

    // The summarizer role falls back to the coach model when absent.
    let summarizer: Arc<dyn LlmClient> = match config.llm.for_role("summarizer") {
        Some(cfg) if cfg.id != coach_cfg.id => Arc::new(
            ResponsesProvider::from_config(cfg).context("building summarizer provider")?,
        ),
        _ => coach.clone(),
    };

    let streams = Arc::new(StreamProcessor::new(
        config.streams.clone(),
        Some(summarizer),
    ));
    let strava = Arc::new(
        StravaClient::from_config(&config.strava, users.clone())
            .context("building strava client")?,
    );

    Ok(AppState {
        config,
        llm: coach,
        strava,
        streams,
        users,
        sessions,
        logbooks,
        cancel_map: Arc::new(CancelMap::new()),
    })
}

/// Look up the chat user, creating a record from `STRAVA_ACCESS_TOKEN` /
/// `STRAVA_REFRESH_TOKEN` on first run.
pub async fn ensure_user(state: &AppState, user_id: &str) -> anyhow::Result<User> {
    if let Some(user) = state.users.get(user_id).await? {
        return Ok(user);
    }

    let access_token = std::env::var("STRAVA_ACCESS_TOKEN").unwrap_or_default();
    let refresh_token = std::env::var("STRAVA_REFRESH_TOKEN").unwrap_or_default();
    if access_token.is_empty() {
        tracing::warn!(
            "creating user {user_id} without credentials — set STRAVA_ACCESS_TOKEN \
             and STRAVA_REFRESH_TOKEN to connect an account"
        );
    }

    let now = Utc::now();
    let user = User {
        id: user_id.to_string(),
        athlete_id: 0,
        access_token,
        refresh_token,
        // Unknown expiry: the first 401 triggers the refresh path.
        token_expires_at: 0,
        display_name: String::new(),
        created_at: now,
        updated_at: now,
    };
    state.users.upsert(&user).await?;
    tracing::info!(user_id = %user_id, "created user record");
    Ok(user)
}
