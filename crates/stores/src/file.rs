//! File-backed store implementations.
//!
//! Layout under the configured state path:
//! - `users.json` — one JSON map of user id → record
//! - `sessions/sessions.json` — session index
//! - `sessions/messages/<session_id>.jsonl` — append-only message rows
//! - `logbooks/<user_id>.json` — one logbook per athlete
//!
//! Writes are serialized behind in-process locks; malformed rows are
//! skipped with a warning rather than failing the whole read.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;

use pl_domain::error::{Error, Result};
use pl_domain::model::{Logbook, Session, StoredMessage, User};

use crate::{LogbookStore, SessionStore, UserStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Users
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// User records backed by a single JSON map file.
pub struct FileUserStore {
    path: PathBuf,
    users: RwLock<HashMap<String, User>>,
}

impl FileUserStore {
    /// Load or create the store at `state_path/users.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("users.json");
        let users = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "unreadable user store, starting empty");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        tracing::info!(users = users.len(), path = %path.display(), "user store loaded");
        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    fn persist(&self, users: &HashMap<String, User>) -> Result<()> {
        let json = serde_json::to_string_pretty(users)?;
        std::fs::write(&self.path, json).map_err(Error::Io)
    }
}

#[async_trait::async_trait]
impl UserStore for FileUserStore {
    async fn get(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(user_id).cloned())
    }

    async fn upsert(&self, user: &User) -> Result<()> {
        let mut users = self.users.write();
        users.insert(user.id.clone(), user.clone());
        self.persist(&users)
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
        let updated = user.clone();
        self.persist(&users)?;
        Ok(updated)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions & messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session index in one JSON file; messages as per-session JSONL logs.
pub struct FileSessionStore {
    index_path: PathBuf,
    messages_dir: PathBuf,
    sessions: RwLock<HashMap<String, Session>>,
    /// Serializes JSONL appends across tasks.
    append_lock: parking_lot::Mutex<()>,
}

impl FileSessionStore {
    /// Load or create the store under `state_path/sessions/`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        let messages_dir = dir.join("messages");
        std::fs::create_dir_all(&messages_dir).map_err(Error::Io)?;

        let index_path = dir.join("sessions.json");
        let sessions = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %index_path.display(),
            "session store loaded"
        );

        Ok(Self {
            index_path,
            messages_dir,
            sessions: RwLock::new(sessions),
            append_lock: parking_lot::Mutex::new(()),
        })
    }

    fn persist_index(&self, sessions: &HashMap<String, Session>) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions)?;
        std::fs::write(&self.index_path, json).map_err(Error::Io)
    }

    fn message_path(&self, session_id: &str) -> PathBuf {
        self.messages_dir.join(format!("{session_id}.jsonl"))
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write();
        sessions.insert(session.id.clone(), session.clone());
        self.persist_index(&sessions)
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
        self.persist_index(&sessions)
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
        self.persist_index(&sessions)
    }

    async fn insert_message(&self, message: &StoredMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        let path = self.message_path(&message.session_id);

        let _guard = self.append_lock.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        file.write_all(json.as_bytes()).map_err(Error::Io)?;
        file.write_all(b"\n").map_err(Error::Io)?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let path = self.message_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut messages = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredMessage>(line) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    tracing::warn!(
                        session_id = session_id,
                        error = %e,
                        "skipping malformed message row"
                    );
                }
            }
        }
        Ok(messages)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logbooks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One JSON file per athlete under `state_path/logbooks/`.
pub struct FileLogbookStore {
    dir: PathBuf,
    write_lock: parking_lot::Mutex<()>,
}

impl FileLogbookStore {
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("logbooks");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(Self {
            dir,
            write_lock: parking_lot::Mutex::new(()),
        })
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{user_id}.json"))
    }

    fn read(&self, user_id: &str) -> Result<Option<Logbook>> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        match serde_json::from_str(&raw) {
            Ok(logbook) => Ok(Some(logbook)),
            Err(e) => {
                tracing::warn!(user_id = user_id, error = %e, "unreadable logbook file");
                Ok(None)
            }
        }
    }

    fn write(&self, logbook: &Logbook) -> Result<()> {
        let json = serde_json::to_string_pretty(logbook)?;
        std::fs::write(self.path_for(&logbook.user_id), json).map_err(Error::Io)
    }
}

#[async_trait::async_trait]
impl LogbookStore for FileLogbookStore {
    async fn get(&self, user_id: &str) -> Result<Option<Logbook>> {
        self.read(user_id)
    }

    async fn create_initial(&self, user_id: &str, content: &str) -> Result<Logbook> {
        let _guard = self.write_lock.lock();
        if let Some(existing) = self.read(user_id)? {
            return Ok(existing);
        }
        let logbook = Logbook {
            user_id: user_id.to_string(),
            content: content.to_string(),
            updated_at: Utc::now(),
        };
        self.write(&logbook)?;
        Ok(logbook)
    }

    async fn update(&self, user_id: &str, content: &str) -> Result<Logbook> {
        let _guard = self.write_lock.lock();
        let logbook = Logbook {
            user_id: user_id.to_string(),
            content: content.to_string(),
            updated_at: Utc::now(),
        };
        self.write(&logbook)?;
        Ok(logbook)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use pl_domain::model::StoredRole;

    fn user(id: &str) -> User {
        let now = Utc::now();
        User {
            id: id.into(),
            athlete_id: 7,
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_expires_at: 100,
            display_name: "Test".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn user_store_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileUserStore::new(dir.path()).unwrap();
            store.upsert(&user("u1")).await.unwrap();
            store
                .update_credentials("u1", "new-a", "new-r", 200)
                .await
                .unwrap();
        }
        let store = FileUserStore::new(dir.path()).unwrap();
        let loaded = store.get("u1").await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "new-a");
        assert_eq!(loaded.token_expires_at, 200);
    }

    #[tokio::test]
    async fn session_messages_append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        let session = Session::new("u1", "first ride chat");
        store.create(&session).await.unwrap();

        store
            .insert_message(&StoredMessage::new(&session.id, StoredRole::User, "hello"))
            .await
            .unwrap();
        store
            .insert_message(&StoredMessage::new(
                &session.id,
                StoredRole::Assistant,
                "hi there",
            ))
            .await
            .unwrap();

        let messages = store.list_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, StoredRole::User);
        assert_eq!(messages[1].content, "hi there");
    }

    #[tokio::test]
    async fn malformed_message_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        let session = Session::new("u1", "t");
        store.create(&session).await.unwrap();
        store
            .insert_message(&StoredMessage::new(&session.id, StoredRole::User, "ok"))
            .await
            .unwrap();

        // Corrupt the log with a bad row.
        let path = dir
            .path()
            .join("sessions")
            .join("messages")
            .join(format!("{}.jsonl", session.id));
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let messages = store.list_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn list_messages_missing_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert!(store.list_messages("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn logbook_create_initial_then_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLogbookStore::new(dir.path()).unwrap();

        assert!(store.get("u1").await.unwrap().is_none());

        let seeded = store.create_initial("u1", "seeded from profile").await.unwrap();
        assert_eq!(seeded.content, "seeded from profile");

        // A second create_initial must not clobber.
        let again = store.create_initial("u1", "other seed").await.unwrap();
        assert_eq!(again.content, "seeded from profile");

        store.update("u1", "week 1: base miles").await.unwrap();
        let loaded = store.get("u1").await.unwrap().unwrap();
        assert_eq!(loaded.content, "week 1: base miles");
    }
}
