//! SightGuide Error Types
//!
//! Centralized error handling for the session core and its collaborators.

use thiserror::Error;

/// Central error type for SightGuide
#[derive(Error, Debug)]
pub enum GuideError {
    #[error("Cloud vision error: {0}")]
    Cloud(String),

    #[error("Session has ended")]
    SessionClosed,

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Result type alias for SightGuide operations
pub type GuideResult<T> = Result<T, GuideError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for GuideError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        GuideError::Lock(err.to_string())
    }
}
