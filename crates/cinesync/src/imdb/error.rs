//! Error types for IMDb GraphQL operations.

use thiserror::Error;

use crate::http::HttpError;
use crate::platform::PlatformError;

/// Errors that can occur when talking to the IMDb GraphQL API.
#[derive(Debug, Error)]
pub enum ImdbError {
    /// The request never got an answer.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success HTTP status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The session cookie was refused.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The GraphQL layer answered with errors.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// A page was requested whose cursor is unknown.
    #[error("No cursor for offset {0}; pages must be requested in order")]
    MissingCursor(usize),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<ImdbError> for PlatformError {
    fn from(err: ImdbError) -> Self {
        match err {
            ImdbError::Http(e) => PlatformError::network(e.to_string()),
            ImdbError::Json(e) => PlatformError::parse(e.to_string()),
            ImdbError::Api { status, message } => match status {
                401 | 403 => PlatformError::AuthRequired,
                404 => PlatformError::not_found(message),
                429 => PlatformError::RateLimited { reset_at: None },
                _ => PlatformError::api(status, message),
            },
            ImdbError::Auth(_) => PlatformError::AuthRequired,
            ImdbError::GraphQl(message) => PlatformError::api(200, message),
            other @ (ImdbError::MissingCursor(_) | ImdbError::Config(_)) => {
                PlatformError::internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let auth = ImdbError::Api {
            status: 401,
            message: "unauthorized".into(),
        };
        assert!(PlatformError::from(auth).is_auth());

        let busy = ImdbError::Api {
            status: 503,
            message: "busy".into(),
        };
        assert!(PlatformError::from(busy).is_transient());
    }

    #[test]
    fn test_graphql_error_is_permanent() {
        let err = PlatformError::from(ImdbError::GraphQl("Rating out of range".into()));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Rating out of range"));
    }

    #[test]
    fn test_missing_cursor_is_internal() {
        let err = PlatformError::from(ImdbError::MissingCursor(250));
        assert!(matches!(err, PlatformError::Internal { .. }));
        assert!(err.to_string().contains("250"));
    }
}
