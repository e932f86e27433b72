//! Reactive token refresh with single-flight per user.
//!
//! On a 401, the client asks this module for fresh credentials. Concurrent
//! callers for the same user serialize on a per-user latch: the first
//! performs the RFC 6749 refresh grant and persists the result through the
//! user store; the rest observe the already-updated record and skip the
//! network round trip entirely. A refresh rejection maps to `AuthRevoked` —
//! there is never more than one refresh attempt per original call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use pl_domain::error::{Error, Result};
use pl_domain::model::User;
use pl_stores::UserStore;

use crate::types::TokenGrant;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Grant exchange seam
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The network half of a refresh: exchange a refresh token for a new grant.
#[async_trait::async_trait]
pub trait GrantExchanger: Send + Sync {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenGrant>;
}

/// HTTP implementation posting the refresh-token grant to the token URL.
pub struct HttpGrantExchanger {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpGrantExchanger {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait::async_trait]
impl GrantExchanger for HttpGrantExchanger {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenGrant> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(e.to_string())
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::FORBIDDEN
        {
            // The grant itself was rejected. No retry.
            return Err(Error::AuthRevoked);
        }
        if status.is_server_error() {
            return Err(Error::ServiceUnavailable(format!(
                "token endpoint returned {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(Error::AuthRevoked);
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| Error::Network(e.to_string()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Single-flight refresher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TokenRefresher {
    exchanger: Arc<dyn GrantExchanger>,
    users: Arc<dyn UserStore>,
    /// user id → async latch serializing refreshes for that user.
    latches: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenRefresher {
    pub fn new(exchanger: Arc<dyn GrantExchanger>, users: Arc<dyn UserStore>) -> Self {
        Self {
            exchanger,
            users,
            latches: Mutex::new(HashMap::new()),
        }
    }

    fn latch_for(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.latches
            .lock()
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Obtain fresh credentials for `user`.
    ///
    /// `stale` is the caller's view of the user record (the one whose
    /// access token just got a 401). Returns the updated record.
    pub async fn refresh(&self, stale: &User) -> Result<User> {
        let latch = self.latch_for(&stale.id);
        let _guard = latch.lock().await;

        // Another caller may have refreshed while we waited on the latch.
        if let Some(current) = self.users.get(&stale.id).await? {
            if current.access_token != stale.access_token {
                tracing::debug!(user_id = %stale.id, "credentials already refreshed by another caller");
                return Ok(current);
            }
        }

        tracing::info!(user_id = %stale.id, "refreshing access token");
        let grant = self.exchanger.exchange(&stale.refresh_token).await?;

        self.users
            .update_credentials(
                &stale.id,
                &grant.access_token,
                &grant.refresh_token,
                grant.expires_at,
            )
            .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
