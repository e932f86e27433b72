//! Persisted data model: users, sessions, messages, logbooks.
//!
//! These are the rows the store adapters read and write. Conversation
//! messages exchanged with the LLM (tool calls, tool results) are a
//! separate transient shape — see [`crate::tool`]; only plain user and
//! assistant text ever lands in a [`StoredMessage`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An athlete with a connected Strava account.
///
/// `Debug` is manually implemented to redact credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Strava's athlete id.
    pub athlete_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) when the access token expires.
    pub token_expires_at: i64,
    #[serde(default)]
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("athlete_id", &self.athlete_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_expires_at", &self.token_expires_at)
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl User {
    /// True when the access token expires within `margin_secs` of now.
    pub fn token_expired(&self, now_unix: i64, margin_secs: i64) -> bool {
        self.token_expires_at <= now_unix + margin_secs
    }
}

/// One conversation between an athlete and the coach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Opaque provider handle of the last LLM response, used to chain the
    /// next invocation without resending history. Advisory only.
    #[serde(default)]
    pub last_response_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            last_response_handle: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Role of a persisted transcript row. Tool traffic is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredRole {
    User,
    Assistant,
}

/// One persisted transcript row (append-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    pub role: StoredRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(session_id: impl Into<String>, role: StoredRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A per-athlete free-form training logbook. At most one per user;
/// overwritten whole on every update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logbook {
    pub user_id: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}
