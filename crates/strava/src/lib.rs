//! Typed Strava client with reactive token refresh.
//!
//! The engine consumes the [`StravaApi`] trait; [`client::StravaClient`] is
//! the HTTP implementation with a process-wide rate limiter and a
//! single-flight-per-user refresh wrapper. `markdown` renders every data
//! shape for the model (tools never return raw JSON).

pub mod client;
pub mod markdown;
pub mod ratelimit;
pub mod refresh;
pub mod types;

pub use client::{StravaApi, StravaClient};
pub use types::*;
