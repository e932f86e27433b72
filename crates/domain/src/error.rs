//! Shared error type used across all Paceline crates.
//!
//! Every failure mode the engine reasons about is a distinct variant —
//! callers match on the variant, never on message text. `coaching_voice`
//! is the single place errors are translated for the athlete-facing
//! output stream.

/// Shared error type used across all Paceline crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials were rejected and could not be refreshed. Fatal for
    /// the current message; the user must reconnect their account.
    #[error("authorization revoked")]
    AuthRevoked,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("network: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Tool arguments failed to parse or validate against the tool schema.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("context overflow: {0}")]
    ContextOverflow(String),

    /// A tool executor failed (or panicked) for a reason of its own.
    #[error("tool failed: {0}")]
    ToolInternal(String),

    #[error("model unavailable: {0}")]
    LlmUnavailable(String),

    #[error("cancelled")]
    Cancelled,

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Athlete-facing rendering of this error.
    ///
    /// Never includes identifiers, provider names, HTTP details, or the
    /// underlying message — those stay in the logs.
    pub fn coaching_voice(&self) -> String {
        match self {
            Error::AuthRevoked => {
                "I've lost access to your activity data — please reconnect your \
                 account and we'll pick up where we left off."
                    .into()
            }
            Error::RateLimited(_) => {
                "I'm pulling in a lot of your data right now and need to pace \
                 myself for a few minutes. Let's try that again shortly."
                    .into()
            }
            Error::NotFound(_) => {
                "I couldn't fetch that activity — it may have been deleted or \
                 set to private."
                    .into()
            }
            Error::ServiceUnavailable(_) | Error::Network(_) => {
                "I'm having trouble reaching your activity data right now. \
                 Let's try again in a moment."
                    .into()
            }
            Error::Timeout(_) => {
                "That took longer than expected and I had to stop waiting. \
                 Let's try again."
                    .into()
            }
            Error::SchemaViolation(msg) => {
                format!("I asked for that data the wrong way ({msg}). Let me try again.")
            }
            Error::ContextOverflow(_) => {
                "That's more data than I can take in at once — I'll work from a \
                 summary instead."
                    .into()
            }
            Error::ToolInternal(_) => {
                "Something went wrong while I was looking at your data. \
                 I'll work with what I have."
                    .into()
            }
            Error::LlmUnavailable(_) => {
                "I'm having trouble thinking right now, please try again in a moment."
                    .into()
            }
            Error::Cancelled => "Okay, stopping here.".into(),
            Error::Io(_) | Error::Json(_) | Error::Config(_) => {
                "Something went wrong on my end. Please try again.".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coaching_voice_never_leaks_detail() {
        let err = Error::NotFound("GET /activities/987654 -> 404".into());
        let voice = err.coaching_voice();
        assert!(!voice.contains("404"));
        assert!(!voice.contains("987654"));
        assert!(!voice.contains("GET"));
    }

    #[test]
    fn coaching_voice_auth_revoked_prompts_reconnect() {
        assert!(Error::AuthRevoked.coaching_voice().contains("reconnect"));
    }

    #[test]
    fn llm_unavailable_is_the_fixed_fallback() {
        let voice = Error::LlmUnavailable("boom".into()).coaching_voice();
        assert_eq!(
            voice,
            "I'm having trouble thinking right now, please try again in a moment."
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
