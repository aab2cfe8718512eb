//! Error types for the catalog sync pipeline
//!
//! Client adapters and the reconciliation driver share one `thiserror` enum.
//! Ambiguous matches are not errors; the matcher reports them as
//! [`MatchWarning`](crate::matcher::MatchWarning)s.

use thiserror::Error;

/// Longest response body excerpt carried in an error message
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Session handle rejected or expired. Aborts the run.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A listing call failed for the given scope
    #[error("fetch failed for {scope}: {message}")]
    Fetch { scope: String, message: String },

    /// An individual update call returned a non-success status
    #[error("update failed for {target}: {message}")]
    Update { target: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced a response
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response arrived but its body did not have the expected shape
    #[error("decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn fetch(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            scope: scope.into(),
            message: message.into(),
        }
    }

    pub fn update(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Update {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Fatal errors abort the whole run; everything else is isolated to the
    /// item or table scope that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::Config(_))
    }

    /// Map a non-success HTTP status from a listing call.
    pub fn from_fetch_status(scope: &str, status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Self::Authentication(format!("{} returned {}", scope, status));
        }
        Self::fetch(scope, format!("{}: {}", status, excerpt(body)))
    }

    /// Map a non-success HTTP status from an update call.
    pub fn from_update_status(target: &str, status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Self::Authentication(format!("{} returned {}", target, status));
        }
        Self::update(target, format!("{}: {}", status, excerpt(body)))
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
