//! Error types for backend and OAuth operations.
//!
//! Every failure talking to the Pulseboard backend or to Google's token
//! endpoint is an [`ApiError`] with a coarse [`ApiErrorCode`]. The code is
//! used for logging and for the IPC error code; nothing retries on it.

use std::fmt;
use thiserror::Error;

/// The category of an API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorCode {
    /// Credentials, code or id token rejected (401, bad token claims).
    AuthenticationFailed,
    /// Authenticated but not allowed (403).
    AuthorizationFailed,
    /// Connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Too many requests (429).
    RateLimited,
    /// Server returned a 5xx status.
    ServerError,
    /// Body could not be parsed.
    InvalidResponse,
    NotFound,
    /// Any other non-2xx status.
    BadRequest,
    /// Required input missing before any request was made.
    MissingFields,
    /// Missing or invalid local configuration.
    ConfigurationError,
    InternalError,
}

impl ApiErrorCode {
    /// Returns a stable snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::MissingFields => "missing_fields",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }

    /// Maps a non-success HTTP status to an error code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::AuthenticationFailed,
            403 => Self::AuthorizationFailed,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::BadRequest,
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error from the backend client or the OAuth exchange.
#[derive(Debug, Error)]
pub struct ApiError {
    code: ApiErrorCode,
    message: String,
    /// The `message` field of the backend's JSON error body, if any.
    server_message: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            server_message: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::AuthenticationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NetworkError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidResponse, message)
    }

    pub fn missing_fields(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::MissingFields, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }

    /// Builds an error for a non-success HTTP response.
    ///
    /// A JSON body of the form `{"message": "..."}` is kept as the server
    /// message.
    pub fn from_response(status: u16, body: &str) -> Self {
        let server_message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message")?.as_str().map(str::to_string))
            .filter(|m| !m.is_empty());

        let mut err = Self::new(
            ApiErrorCode::from_status(status),
            format!("backend returned HTTP {status}"),
        );
        err.server_message = server_message;
        err
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ApiErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the human-readable message the backend sent, if any.
    pub fn server_message(&self) -> Option<&str> {
        self.server_message.as_deref()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(ref server) = self.server_message {
            write!(f, " ({server})")?;
        }
        Ok(())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "could not connect to backend".to_string()
        } else {
            format!("request failed: {err}")
        };
        Self::network(message).with_source(err)
    }
}

/// A specialized Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiErrorCode::from_status(401),
            ApiErrorCode::AuthenticationFailed
        );
        assert_eq!(
            ApiErrorCode::from_status(403),
            ApiErrorCode::AuthorizationFailed
        );
        assert_eq!(ApiErrorCode::from_status(404), ApiErrorCode::NotFound);
        assert_eq!(ApiErrorCode::from_status(429), ApiErrorCode::RateLimited);
        assert_eq!(ApiErrorCode::from_status(500), ApiErrorCode::ServerError);
        assert_eq!(ApiErrorCode::from_status(503), ApiErrorCode::ServerError);
        assert_eq!(ApiErrorCode::from_status(400), ApiErrorCode::BadRequest);
        assert_eq!(ApiErrorCode::from_status(409), ApiErrorCode::BadRequest);
    }

    #[test]
    fn from_response_keeps_server_message() {
        let err = ApiError::from_response(400, r#"{"message":"Invalid credentials"}"#);
        assert_eq!(err.code(), ApiErrorCode::BadRequest);
        assert_eq!(err.server_message(), Some("Invalid credentials"));
        assert!(err.to_string().contains("Invalid credentials"));
    }

    #[test]
    fn from_response_without_json_body() {
        let err = ApiError::from_response(502, "<html>bad gateway</html>");
        assert_eq!(err.code(), ApiErrorCode::ServerError);
        assert!(err.server_message().is_none());

        let err = ApiError::from_response(401, r#"{"message":""}"#);
        assert!(err.server_message().is_none());
    }

    #[test]
    fn display_includes_code() {
        let err = ApiError::missing_fields("email and password are required");
        assert_eq!(
            err.to_string(),
            "missing_fields: email and password are required"
        );
    }

    #[test]
    fn with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = ApiError::internal("failed to save session").with_source(io_err);
        assert!(err.source().is_some());
    }
}
