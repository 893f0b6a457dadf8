//! Request and response types for the pulseboard protocol.

use chrono::{DateTime, Utc};
use pulseboard_core::FeedView;
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Message envelope wrapping all protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Unique request ID for correlation.
    pub request_id: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Request types that can be sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Get the ranked home feed.
    GetFeed {
        /// Maximum number of cards per section.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
        /// Only keep cards from followed organizers.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        followed_only: bool,
    },

    /// Get server status.
    Status,

    /// Reload viewer and events from the backend.
    Refresh {
        /// Run even if a load is already in flight.
        force: bool,
    },

    /// Forward a Google authorization code to the backend session endpoint.
    GoogleLogin {
        code: String,
        /// Redirect URI the code was issued for, if not the configured one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        redirect_uri: Option<String>,
        /// PKCE verifier for codes obtained through the browser flow.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code_verifier: Option<String>,
    },

    /// Email/password login against the backend.
    Login { email: String, password: String },

    /// Request server shutdown.
    Shutdown,

    /// Ping to check server liveness.
    Ping,
}

impl Request {
    /// Creates a GetFeed request with no limit and no filter.
    pub fn get_feed() -> Self {
        Self::GetFeed {
            limit: None,
            followed_only: false,
        }
    }

    pub fn refresh(force: bool) -> Self {
        Self::Refresh { force }
    }

    pub fn google_login(code: impl Into<String>) -> Self {
        Self::GoogleLogin {
            code: code.into(),
            redirect_uri: None,
            code_verifier: None,
        }
    }

    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Login {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Short name used in logs. Never includes credentials.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetFeed { .. } => "get_feed",
            Self::Status => "status",
            Self::Refresh { .. } => "refresh",
            Self::GoogleLogin { .. } => "google_login",
            Self::Login { .. } => "login",
            Self::Shutdown => "shutdown",
            Self::Ping => "ping",
        }
    }
}

/// Response types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// The ranked home feed.
    Feed { feed: FeedView },

    /// Server status information.
    Status {
        #[serde(flatten)]
        info: StatusInfo,
    },

    /// Generic success response.
    Ok,

    /// Error response.
    Error {
        #[serde(flatten)]
        error: ErrorResponse,
    },

    /// Pong response to Ping.
    Pong,
}

impl Response {
    pub fn feed(feed: FeedView) -> Self {
        Self::Feed { feed }
    }

    pub fn status(info: StatusInfo) -> Self {
        Self::Status { info }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse::new(code, message),
        }
    }

    pub fn from_error(error: ErrorResponse) -> Self {
        Self::Error { error }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// Returns the error if this is an error response.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Server status information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    /// Server uptime in seconds.
    pub uptime_seconds: u64,

    /// Display name of the loaded viewer, if any load succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_name: Option<String>,

    /// Number of events currently held.
    pub event_count: usize,

    /// Time of the last successful load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_load: Option<DateTime<Utc>>,

    /// Error of the most recent failed load, cleared by the next success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Generation of the data currently held (0 before the first load).
    pub generation: u64,

    /// Whether a load is running right now.
    #[serde(default)]
    pub load_in_flight: bool,
}

impl StatusInfo {
    pub fn new(uptime_seconds: u64) -> Self {
        Self {
            uptime_seconds,
            ..Self::default()
        }
    }

    /// Returns true if the last load attempt failed.
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Error codes for protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InternalError,
    InvalidRequest,
    Timeout,
    /// The backend rejected the credentials or code.
    AuthenticationFailed,
    /// The backend is unreachable or answered with an error.
    BackendError,
    RateLimited,
    NotFound,
    ShuttingDown,
}

impl ErrorCode {
    /// Returns a human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InternalError => "An internal error occurred",
            Self::InvalidRequest => "The request was invalid",
            Self::Timeout => "The request timed out",
            Self::AuthenticationFailed => "Authentication failed",
            Self::BackendError => "Backend returned an error",
            Self::RateLimited => "Rate limited by backend",
            Self::NotFound => "Requested resource not found",
            Self::ShuttingDown => "Server is shutting down",
        }
    }
}

/// Error response details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_core::{Badge, Event, Viewer};

    #[test]
    fn envelope_creation() {
        let envelope = Envelope::request("req-123", Request::Ping);
        assert_eq!(envelope.protocol_version, "1");
        assert_eq!(envelope.request_id, "req-123");
        assert!(envelope.is_compatible());
    }

    #[test]
    fn envelope_incompatible_version() {
        let envelope = Envelope {
            protocol_version: "2".to_string(),
            request_id: "req-123".to_string(),
            payload: Request::Ping,
        };
        assert!(!envelope.is_compatible());
    }

    #[test]
    fn request_serde_ping() {
        let json = serde_json::to_string(&Request::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn request_serde_get_feed() {
        let json = serde_json::to_string(&Request::get_feed()).unwrap();
        assert_eq!(json, r#"{"type":"get_feed"}"#);

        let parsed: Request =
            serde_json::from_str(r#"{"type":"get_feed","limit":3,"followed_only":true}"#).unwrap();
        assert_eq!(
            parsed,
            Request::GetFeed {
                limit: Some(3),
                followed_only: true
            }
        );
    }

    #[test]
    fn request_serde_refresh() {
        let json = serde_json::to_string(&Request::refresh(true)).unwrap();
        assert_eq!(json, r#"{"type":"refresh","force":true}"#);
    }

    #[test]
    fn request_serde_login() {
        let json = serde_json::to_string(&Request::google_login("4/abc")).unwrap();
        assert_eq!(json, r#"{"type":"google_login","code":"4/abc"}"#);

        let parsed: Request =
            serde_json::from_str(r#"{"type":"login","email":"a@b.c","password":"pw"}"#).unwrap();
        assert_eq!(parsed, Request::login("a@b.c", "pw"));

        let parsed: Request = serde_json::from_str(
            r#"{"type":"google_login","code":"c","redirect_uri":"http://127.0.0.1:8765/callback","code_verifier":"v"}"#,
        )
        .unwrap();
        assert!(matches!(
            parsed,
            Request::GoogleLogin { code_verifier: Some(ref v), .. } if v == "v"
        ));
    }

    #[test]
    fn request_kind_hides_credentials() {
        assert_eq!(Request::login("a@b.c", "secret").kind(), "login");
        assert_eq!(Request::get_feed().kind(), "get_feed");
    }

    #[test]
    fn response_serde_feed() {
        let viewer = Viewer::new("Ada", ["chess"].into_iter().collect());
        let events = vec![Event::new("e1", "Blitz", Badge::Live).with_club("chess")];
        let response = Response::feed(FeedView::build(&viewer, &events, None));

        let value = serde_json::to_value(&response).unwrap();
        insta::with_settings!({ sort_maps => true }, {
            insta::assert_json_snapshot!(value, @r###"
            {
              "feed": {
                "live": [
                  {
                    "_id": "e1",
                    "accent": "#CCF900",
                    "badge": "LIVE",
                    "clubId": "chess",
                    "followed": true,
                    "title": "Blitz"
                  }
                ],
                "upcoming": [],
                "viewer_name": "Ada"
              },
              "type": "feed"
            }
            "###);
        });

        let parsed: Response = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn response_serde_status() {
        let info = StatusInfo {
            event_count: 4,
            generation: 2,
            ..StatusInfo::new(60)
        };
        let json = serde_json::to_string(&Response::status(info.clone())).unwrap();
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""uptime_seconds":60"#));
        assert!(!json.contains("last_error"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Response::status(info));
    }

    #[test]
    fn response_serde_error() {
        let response = Response::error(ErrorCode::AuthenticationFailed, "bad code");
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"type":"error","code":"authentication_failed","message":"bad code"}"#
        );
        assert!(!response.is_success());
        assert_eq!(response.as_error().unwrap().message, "bad code");
    }

    #[test]
    fn status_stale_flag() {
        let mut info = StatusInfo::new(1);
        assert!(!info.is_stale());
        info.last_error = Some("network".into());
        assert!(info.is_stale());
    }
}
