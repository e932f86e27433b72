//! In-memory store implementations for tests and embedders.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use pl_domain::error::{Error, Result};
use pl_domain::model::{Logbook, Session, StoredMessage, User};

use crate::{LogbookStore, SessionStore, UserStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Users
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: User) -> Self {
        let store = Self::new();
        store.users.write().insert(user.id.clone(), user);
        store
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(user_id).cloned())
    }

    async fn upsert(&self, user: &User) -> Result<()> {
        self.users.write().insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: i64,
    ) -> Result<User> {
        let mut users = self.users.write();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| Error::NotFound(format!("user {user_id}")))?;
        user.access_token = access_token.to_string();
        user.refresh_token = refresh_token.to_string();
        user.token_expires_at = token_expires_at;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions & messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    messages: RwLock<HashMap<String, Vec<StoredMessage>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn set_title(&self, session_id: &str, title: &str) -> Result<()> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn set_last_response_handle(
        &self,
        session_id: &str,
        handle: Option<&str>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        session.last_response_handle = handle.map(String::from);
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_message(&self, message: &StoredMessage) -> Result<()> {
        self.messages
            .write()
            .entry(message.session_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        Ok(self
            .messages
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logbooks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct MemoryLogbookStore {
    logbooks: RwLock<HashMap<String, Logbook>>,
}

impl MemoryLogbookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LogbookStore for MemoryLogbookStore {
    async fn get(&self, user_id: &str) -> Result<Option<Logbook>> {
        Ok(self.logbooks.read().get(user_id).cloned())
    }

    async fn create_initial(&self, user_id: &str, content: &str) -> Result<Logbook> {
        let mut logbooks = self.logbooks.write();
        if let Some(existing) = logbooks.get(user_id) {
            return Ok(existing.clone());
        }
        let logbook = Logbook {
            user_id: user_id.to_string(),
            content: content.to_string(),
            updated_at: Utc::now(),
        };
        logbooks.insert(user_id.to_string(), logbook.clone());
        Ok(logbook)
    }

    async fn update(&self, user_id: &str, content: &str) -> Result<Logbook> {
        let logbook = Logbook {
            user_id: user_id.to_string(),
            content: content.to_string(),
            updated_at: Utc::now(),
        };
        self.logbooks
            .write()
            .insert(user_id.to_string(), logbook.clone());
        Ok(logbook)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
