//! HTTP client for the Pulseboard backend.
//!
//! Four calls are made against the backend:
//!
//! | Call                | Endpoint                 |
//! |---------------------|--------------------------|
//! | profile             | `GET /api/users/me`      |
//! | event feed          | `GET /api/events/feed`   |
//! | Google session      | `POST /api/auth/google`  |
//! | email/password      | `POST /api/auth/login`   |
//!
//! Non-2xx statuses map onto [`ApiErrorCode`](crate::ApiErrorCode) through
//! [`ApiError::from_response`].

use std::sync::{PoisonError, RwLock};

use pulseboard_core::{Event, Viewer};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::config::BackendConfig;
use crate::error::{ApiError, ApiResult};
use crate::google::AuthorizationGrant;
use crate::profile::{FeedResponse, ProfileResponse};
use crate::session::Session;

pub const PROFILE_PATH: &str = "/api/users/me";
pub const FEED_PATH: &str = "/api/events/feed";
pub const GOOGLE_SESSION_PATH: &str = "/api/auth/google";
pub const LOGIN_PATH: &str = "/api/auth/login";

/// Client for the Pulseboard REST backend.
#[derive(Debug)]
pub struct BackendClient {
    config: BackendConfig,
    http_client: reqwest::Client,
    token: RwLock<Option<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleSessionRequest<'a> {
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(concat!("pulseboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            config,
            http_client,
            token: RwLock::new(None),
        })
    }

    /// Starts with a bearer token from a stored session.
    pub fn with_token(self, token: Option<String>) -> Self {
        self.set_token(token);
        self
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Fetches the signed-in viewer.
    #[instrument(skip(self))]
    pub async fn fetch_profile(&self) -> ApiResult<Viewer> {
        let profile: ProfileResponse = self.get_json(PROFILE_PATH).await?;
        let viewer = profile.into_viewer();
        debug!(following = viewer.following.len(), "fetched profile");
        Ok(viewer)
    }

    /// Fetches the full event feed in backend order.
    #[instrument(skip(self))]
    pub async fn fetch_event_feed(&self) -> ApiResult<Vec<Event>> {
        let feed: FeedResponse = self.get_json(FEED_PATH).await?;
        let events = feed.into_events();
        debug!(count = events.len(), "fetched event feed");
        Ok(events)
    }

    /// Forwards a Google authorization code to the backend session endpoint.
    ///
    /// Any 2xx is success. A `token` in the body becomes the bearer for
    /// later calls.
    #[instrument(skip_all)]
    pub async fn google_session(&self, grant: &AuthorizationGrant) -> ApiResult<Session> {
        let request = GoogleSessionRequest {
            code: &grant.code,
            redirect_uri: grant.redirect_uri.as_deref(),
            code_verifier: grant.code_verifier.as_deref(),
        };
        let body = self.post_json(GOOGLE_SESSION_PATH, &request).await?;
        Ok(self.establish(Session::from_body("google", &body)))
    }

    /// Email/password login.
    ///
    /// Empty fields are rejected before any request is made.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<Session> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::missing_fields(
                "Please enter both email and password.",
            ));
        }

        let body = self
            .post_json(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        Ok(self.establish(Session::from_body("password", &body)))
    }

    fn establish(&self, session: Session) -> Session {
        if session.token.is_some() {
            self.set_token(session.token.clone());
        }
        info!(method = %session.method, has_token = session.token.is_some(), "session established");
        session
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.config.endpoint(path);
        let response = self.authorized(self.http_client.get(&url)).send().await?;
        let body = Self::read_body(response).await?;

        serde_json::from_str(&body).map_err(|e| {
            ApiError::invalid_response(format!("unexpected response from {}", path)).with_source(e)
        })
    }

    async fn post_json<B: Serialize>(&self, path: &str, payload: &B) -> ApiResult<String> {
        let url = self.config.endpoint(path);
        let body = serde_json::to_vec(payload)
            .map_err(|e| ApiError::internal("failed to encode request").with_source(e))?;
        let response = self
            .authorized(self.http_client.post(&url))
            .body(body)
            .send()
            .await?;
        Self::read_body(response).await
    }

    async fn read_body(response: reqwest::Response) -> ApiResult<String> {
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network("failed to read response body").with_source(e))?;

        debug!(%status, path = %url, bytes = body.len(), "backend response");

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &body));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorCode;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BackendClient {
        BackendClient::new(BackendConfig::new(&server.uri()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn fetch_profile_top_level() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Ada",
                "following": ["chess"],
            })))
            .mount(&server)
            .await;

        let viewer = client(&server).fetch_profile().await.unwrap();
        assert_eq!(viewer.name, "Ada");
        assert!(viewer.following.contains(Some("chess")));
    }

    #[tokio::test]
    async fn fetch_profile_nested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "name": "Ada", "following": ["chess"] },
            })))
            .mount(&server)
            .await;

        let viewer = client(&server).fetch_profile().await.unwrap();
        assert_eq!(viewer.name, "Ada");
        assert_eq!(viewer.following.len(), 1);
    }

    #[tokio::test]
    async fn fetch_event_feed_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FEED_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "_id": "e1", "clubId": "c", "title": "Jam", "badge": "LIVE" },
                    { "_id": "e2", "title": "Talk", "badge": "UPCOMING", "date": "garbage" },
                ],
            })))
            .mount(&server)
            .await;

        let events = client(&server).fetch_event_feed().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].club_id.as_deref(), Some("c"));
        assert!(events[1].date.is_none());
    }

    #[tokio::test]
    async fn status_codes_map_to_error_codes() {
        let cases = [
            (401u16, ApiErrorCode::AuthenticationFailed),
            (403, ApiErrorCode::AuthorizationFailed),
            (404, ApiErrorCode::NotFound),
            (429, ApiErrorCode::RateLimited),
            (503, ApiErrorCode::ServerError),
            (422, ApiErrorCode::BadRequest),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(FEED_PATH))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let err = client(&server).fetch_event_feed().await.unwrap_err();
            assert_eq!(err.code(), expected, "status {status}");
        }
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FEED_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"events\": 3}"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_event_feed().await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::InvalidResponse);
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = BackendConfig::new(&format!("http://127.0.0.1:{port}")).unwrap();
        let err = BackendClient::new(config)
            .unwrap()
            .fetch_profile()
            .await
            .unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::NetworkError);
    }

    #[tokio::test]
    async fn google_session_stores_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GOOGLE_SESSION_PATH))
            .and(body_json(serde_json::json!({ "code": "4/abc" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "jwt-1" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .and(header("authorization", "Bearer jwt-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "Ada" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let session = client
            .google_session(&AuthorizationGrant::from_code("4/abc"))
            .await
            .unwrap();
        assert_eq!(session.token.as_deref(), Some("jwt-1"));
        assert_eq!(session.method, "google");
        assert_eq!(client.token().as_deref(), Some("jwt-1"));

        client.fetch_profile().await.unwrap();
    }

    #[tokio::test]
    async fn google_session_without_token_keeps_previous() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GOOGLE_SESSION_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client(&server).with_token(Some("old".into()));
        let session = client
            .google_session(&AuthorizationGrant::from_code("c"))
            .await
            .unwrap();
        assert!(session.token.is_none());
        assert_eq!(client.token().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn login_rejects_missing_fields_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.login("", "pw").await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::MissingFields);
        let err = client.login("   ", "pw").await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::MissingFields);
        let err = client.login("a@b.c", "").await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn login_error_carries_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json(serde_json::json!({ "email": "a@b.c", "password": "pw" })))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "message": "Invalid credentials" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).login("a@b.c", "pw").await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::BadRequest);
        assert_eq!(err.server_message(), Some("Invalid credentials"));
    }
}
