//! Typed Strava client.
//!
//! Every method takes the athlete's user record, runs through the
//! process-wide rate limiter, and reacts to a 401 by refreshing the token
//! (single-flight per user, see [`crate::refresh`]) and retrying exactly
//! once. A second 401 after refresh surfaces as `AuthRevoked`.
//!
//! The HTTP leg sits behind the [`ApiTransport`] seam so the retry wiring
//! is exercised by tests without a live server.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use pl_domain::config::StravaConfig;
use pl_domain::error::{Error, Result};
use pl_domain::model::User;
use pl_stores::UserStore;

use crate::ratelimit::FixedWindowLimiter;
use crate::refresh::{GrantExchanger, HttpGrantExchanger, TokenRefresher};
use crate::types::{
    ActivityZone, Athlete, AthleteZones, DetailedActivity, RawStream, StreamSet, SummaryActivity,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The Strava surface consumed by the tool executors.
#[async_trait::async_trait]
pub trait StravaApi: Send + Sync {
    async fn athlete(&self, user: &User) -> Result<Athlete>;

    async fn athlete_zones(&self, user: &User) -> Result<AthleteZones>;

    async fn recent_activities(&self, user: &User, per_page: u32) -> Result<Vec<SummaryActivity>>;

    async fn activity(&self, user: &User, activity_id: i64) -> Result<DetailedActivity>;

    async fn activity_zones(&self, user: &User, activity_id: i64) -> Result<Vec<ActivityZone>>;

    async fn activity_streams(
        &self,
        user: &User,
        activity_id: i64,
        keys: &[String],
        resolution: &str,
    ) -> Result<StreamSet>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport seam
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One API response: the status code plus the raw body.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

/// The network half of an API call: issue an authenticated GET and return
/// the reply. Transport-level failures (connect, timeout) are errors;
/// HTTP-level failures come back as a status for the client to interpret.
#[async_trait::async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        access_token: &str,
    ) -> Result<ApiReply>;
}

/// HTTP implementation over `reqwest`.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ApiTransport for HttpTransport {
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        access_token: &str,
    ) -> Result<ApiReply> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(from_transport)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(from_transport)?;
        Ok(ApiReply { status, body })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StravaClient {
    transport: Arc<dyn ApiTransport>,
    limiter: FixedWindowLimiter,
    refresher: TokenRefresher,
}

impl StravaClient {
    /// Build the client from config. The client secret is read from the
    /// configured env var; a missing secret only fails refresh, not reads.
    pub fn from_config(cfg: &StravaConfig, users: Arc<dyn UserStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_s))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let client_secret = std::env::var(&cfg.client_secret_env).unwrap_or_else(|_| {
            tracing::warn!(
                env = %cfg.client_secret_env,
                "client secret env var not set; token refresh will fail"
            );
            String::new()
        });

        let exchanger: Arc<dyn GrantExchanger> = Arc::new(HttpGrantExchanger::new(
            http.clone(),
            cfg.token_url.clone(),
            cfg.client_id.clone(),
            client_secret,
        ));
        let transport: Arc<dyn ApiTransport> =
            Arc::new(HttpTransport::new(http, cfg.base_url.clone()));

        Ok(Self::with_parts(cfg, users, exchanger, transport))
    }

    /// Construct with explicit seams (tests and embedders).
    pub fn with_parts(
        cfg: &StravaConfig,
        users: Arc<dyn UserStore>,
        exchanger: Arc<dyn GrantExchanger>,
        transport: Arc<dyn ApiTransport>,
    ) -> Self {
        Self {
            transport,
            limiter: FixedWindowLimiter::new(
                cfg.rate_limit_per_window,
                Duration::from_secs(cfg.rate_window_s),
            ),
            refresher: TokenRefresher::new(exchanger, users),
        }
    }

    /// GET with one refresh-and-retry on 401.
    async fn get_json<T: DeserializeOwned>(
        &self,
        user: &User,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.limiter.try_acquire()?;
        let reply = self.transport.get(path, query, &user.access_token).await?;

        if reply.status == 401 {
            tracing::debug!(user_id = %user.id, path = path, "401 from api, refreshing token");
            let refreshed = self.refresher.refresh(user).await?;
            self.limiter.try_acquire()?;
            let retry = self
                .transport
                .get(path, query, &refreshed.access_token)
                .await?;
            if retry.status == 401 {
                return Err(Error::AuthRevoked);
            }
            return decode_reply(retry, path);
        }

        decode_reply(reply, path)
    }
}

/// Map a non-401 reply to a typed value or the error taxonomy.
fn decode_reply<T: DeserializeOwned>(reply: ApiReply, path: &str) -> Result<T> {
    if let Some(err) = map_status(reply.status, path) {
        return Err(err);
    }
    Ok(serde_json::from_str(&reply.body)?)
}

/// Status → error taxonomy for non-success codes. `None` means success.
fn map_status(status: u16, path: &str) -> Option<Error> {
    match status {
        200..=299 => None,
        404 => Some(Error::NotFound(path.to_string())),
        429 => Some(Error::RateLimited("upstream api window exhausted".into())),
        500..=599 => Some(Error::ServiceUnavailable(format!(
            "{path} returned {status}"
        ))),
        other => Some(Error::ServiceUnavailable(format!(
            "{path} returned unexpected {other}"
        ))),
    }
}

fn from_transport(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

#[async_trait::async_trait]
impl StravaApi for StravaClient {
    async fn athlete(&self, user: &User) -> Result<Athlete> {
        self.get_json(user, "/athlete", &[]).await
    }

    async fn athlete_zones(&self, user: &User) -> Result<AthleteZones> {
        self.get_json(user, "/athlete/zones", &[]).await
    }

    async fn recent_activities(&self, user: &User, per_page: u32) -> Result<Vec<SummaryActivity>> {
        self.get_json(
            user,
            "/athlete/activities",
            &[("per_page", per_page.to_string())],
        )
        .await
    }

    async fn activity(&self, user: &User, activity_id: i64) -> Result<DetailedActivity> {
        self.get_json(user, &format!("/activities/{activity_id}"), &[])
            .await
    }

    async fn activity_zones(&self, user: &User, activity_id: i64) -> Result<Vec<ActivityZone>> {
        self.get_json(user, &format!("/activities/{activity_id}/zones"), &[])
            .await
    }

    async fn activity_streams(
        &self,
        user: &User,
        activity_id: i64,
        keys: &[String],
        resolution: &str,
    ) -> Result<StreamSet> {
        let raw: std::collections::HashMap<String, RawStream> = self
            .get_json(
                user,
                &format!("/activities/{activity_id}/streams"),
                &[
                    ("keys", keys.join(",")),
                    ("key_by_type", "true".to_string()),
                    ("resolution", resolution.to_string()),
                ],
            )
            .await?;
        Ok(StreamSet::from_wire(raw))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
