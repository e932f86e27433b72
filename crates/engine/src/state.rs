use std::sync::Arc;

use pl_domain::config::Config;
use pl_providers::LlmClient;
use pl_strava::StravaApi;
use pl_streams::StreamProcessor;
use pl_stores::{LogbookStore, SessionStore, UserStore};

use crate::runtime::cancel::CancelMap;

/// Shared application state: the configuration plus every capability the
/// runtime needs, passed by clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── External services ─────────────────────────────────────────
    pub llm: Arc<dyn LlmClient>,
    pub strava: Arc<dyn StravaApi>,
    pub streams: Arc<StreamProcessor>,

    // ── Stores ────────────────────────────────────────────────────
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub logbooks: Arc<dyn LogbookStore>,

    // ── Runtime ───────────────────────────────────────────────────
    pub cancel_map: Arc<CancelMap>,
}
