//! Store adapters: users, sessions/messages, logbooks.
//!
//! The engine only sees the three capability traits below. `file` holds the
//! JSON/JSONL-backed implementations used by the binary; `memory` holds
//! in-memory implementations used by tests and embedders.

pub mod file;
pub mod memory;

use pl_domain::error::Result;
use pl_domain::model::{Logbook, Session, StoredMessage, User};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read/write access to athlete records. The credential-update path is the
/// only mutation the engine performs after signup.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<User>>;

    async fn upsert(&self, user: &User) -> Result<()>;

    /// Replace a user's credentials after a token refresh. Returns the
    /// updated record.
    async fn update_credentials(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: i64,
    ) -> Result<User>;
}

/// Session rows plus their append-only message transcripts.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<()>;

    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    async fn set_title(&self, session_id: &str, title: &str) -> Result<()>;

    /// Persist the provider's last response handle for chaining.
    async fn set_last_response_handle(
        &self,
        session_id: &str,
        handle: Option<&str>,
    ) -> Result<()>;

    async fn insert_message(&self, message: &StoredMessage) -> Result<()>;

    async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>>;
}

/// The per-athlete free-form logbook. At most one per user.
#[async_trait::async_trait]
pub trait LogbookStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Logbook>>;

    /// Create the logbook with seed content only if it does not exist yet.
    /// Returns the logbook either way.
    async fn create_initial(&self, user_id: &str, content: &str) -> Result<Logbook>;

    /// Overwrite the logbook content, creating it if needed.
    async fn update(&self, user_id: &str, content: &str) -> Result<Logbook>;
}
