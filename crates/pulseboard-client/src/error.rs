//! Client error types.

use thiserror::Error;

use pulseboard_api::ApiError;
use pulseboard_protocol::{ErrorResponse, ProtocolError};
use pulseboard_server::ServerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Shown for every failed Google sign-in, whatever the cause.
pub const GOOGLE_LOGIN_FAILED: &str = "Login failed: could not verify account with server.";

/// How a login was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Google,
    Password,
}

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Direct call to the backend or Google failed.
    #[error("backend error: {0}")]
    Api(#[from] ApiError),

    /// Running the daemon failed.
    #[error("daemon error: {0}")]
    Daemon(#[from] ServerError),

    /// The daemon answered with an error.
    #[error("server error: {0}")]
    Server(ErrorResponse),

    /// Login was rejected. `message` is already fit for display for
    /// password logins.
    #[error("login failed: {message}")]
    LoginFailed {
        method: LoginMethod,
        message: String,
    },

    /// Connection to the daemon failed.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Timeout { operation } => Self::Timeout(operation),
            ProtocolError::Io(e) => Self::Io(e),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl ClientError {
    pub fn login_failed(method: LoginMethod, message: impl Into<String>) -> Self {
        Self::LoginFailed {
            method,
            message: message.into(),
        }
    }

    /// The text shown to the user.
    ///
    /// Login failures collapse to the generic alert texts; everything else
    /// shows its full description.
    pub fn user_message(&self) -> String {
        match self {
            Self::LoginFailed {
                method: LoginMethod::Google,
                ..
            } => GOOGLE_LOGIN_FAILED.to_string(),
            Self::LoginFailed {
                method: LoginMethod::Password,
                message,
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_protocol::ErrorCode;

    #[test]
    fn google_failures_collapse() {
        let err = ClientError::login_failed(LoginMethod::Google, "token exchange rejected");
        assert_eq!(err.user_message(), GOOGLE_LOGIN_FAILED);
        assert!(err.to_string().contains("token exchange rejected"));
    }

    #[test]
    fn password_failures_show_message() {
        let err = ClientError::login_failed(LoginMethod::Password, "Invalid credentials");
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[test]
    fn other_errors_show_description() {
        let err = ClientError::Server(ErrorResponse::new(ErrorCode::Timeout, "slow"));
        assert_eq!(err.user_message(), "server error: The request timed out: slow");

        let err: ClientError = ProtocolError::timeout("reading response").into();
        assert!(matches!(err, ClientError::Timeout(ref op) if op == "reading response"));
    }
}
