//! Error types for Douban operations.

use thiserror::Error;

use crate::http::HttpError;
use crate::platform::PlatformError;

/// Errors that can occur when talking to Douban.
#[derive(Debug, Error)]
pub enum DoubanError {
    /// The request never got an answer.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Douban answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The cookie is missing, expired or lacks the `ck` token.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Douban accepted the request but refused the rating.
    #[error("Rating rejected: {message}")]
    Rejected { status: u16, message: String },

    /// Invalid configuration (user id, URL).
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<DoubanError> for PlatformError {
    fn from(err: DoubanError) -> Self {
        match err {
            DoubanError::Http(e) => PlatformError::network(e.to_string()),
            DoubanError::Json(e) => PlatformError::parse(e.to_string()),
            DoubanError::Api { status, message } => match status {
                // Douban answers 403 for expired sessions as well as bans.
                401 | 403 => PlatformError::AuthRequired,
                404 => PlatformError::not_found(message),
                429 => PlatformError::RateLimited { reset_at: None },
                _ => PlatformError::api(status, message),
            },
            DoubanError::Auth(_) => PlatformError::AuthRequired,
            DoubanError::Rejected { status, message } => PlatformError::api(status, message),
            DoubanError::Config(msg) => PlatformError::internal(msg),
        }
    }
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &DoubanError) -> String {
    match err {
        DoubanError::Http(_) => "Network error".to_string(),
        DoubanError::Json(_) => "JSON parse error".to_string(),
        DoubanError::Api { status, message } => {
            if message.chars().count() > 50 {
                let truncated: String = message.chars().take(47).collect();
                format!("HTTP {}: {}...", status, truncated)
            } else {
                format!("HTTP {}: {}", status, message)
            }
        }
        DoubanError::Auth(_) => "Authentication failed".to_string(),
        DoubanError::Rejected { message, .. } => format!("Rejected: {}", message),
        DoubanError::Config(msg) => format!("Config: {}", msg),
    }
}
