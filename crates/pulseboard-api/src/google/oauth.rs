//! Google OAuth authorization and code exchange.
//!
//! Two halves of the sign-in bridge live here:
//!
//! - [`GoogleOAuthClient::authorize`] runs the browser flow on the user's
//!   machine: PKCE challenge, loopback redirect, wait for the code.
//! - [`GoogleOAuthClient::exchange_code`] trades a code for tokens at Google's
//!   token endpoint and returns the [`Identity`] asserted by the id token.
//!
//! # Flow Overview
//!
//! 1. Generate a code verifier and its SHA-256 challenge
//! 2. Bind a loopback HTTP listener on the first free port of the range
//! 3. Open the browser on Google's consent page
//! 4. Google redirects to the loopback listener with `code` and `state`
//! 5. Return the code together with the redirect URI and verifier it needs

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use super::config::GoogleConfig;
use super::identity::{Identity, verify_id_token};
use crate::error::{ApiError, ApiResult};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Timeout for waiting for the OAuth callback.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// An authorization code plus what is needed to redeem it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub code: String,
    /// Redirect URI the code was issued for, when it differs from the
    /// configured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// PKCE verifier, when the code was requested with a challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}

impl AuthorizationGrant {
    /// A bare code, redeemed with the configured redirect URI and no PKCE.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            redirect_uri: None,
            code_verifier: None,
        }
    }
}

/// OAuth client for Google sign-in.
#[derive(Debug)]
pub struct GoogleOAuthClient {
    config: GoogleConfig,
    http_client: reqwest::Client,
    token_url: String,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleConfig) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            config,
            http_client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        })
    }

    /// Overrides the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Runs the browser flow and returns the authorization grant.
    ///
    /// # Errors
    ///
    /// Fails if no port in the range is free, the user denies access, the
    /// callback state does not match, or nobody answers within five minutes.
    pub async fn authorize(&self) -> ApiResult<AuthorizationGrant> {
        let pkce = PkceFlow::new();

        let (listener, port) = Self::bind_loopback_server(self.config.loopback_port_range)?;
        let redirect_uri = GoogleConfig::loopback_redirect_uri(port);

        let auth_url = pkce.build_auth_url(
            &self.config.credentials.client_id,
            &redirect_uri,
            &self.config.scopes,
        );

        info!("starting Google sign-in, opening browser...");
        debug!("authorization URL: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let (code, received_state) = tokio::task::spawn_blocking(move || {
            Self::wait_for_callback(listener)
        })
        .await
        .map_err(|e| ApiError::internal("callback task failed").with_source(e))??;

        if received_state != pkce.state {
            return Err(ApiError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code");
        Ok(AuthorizationGrant {
            code,
            redirect_uri: Some(redirect_uri),
            code_verifier: Some(pkce.verifier),
        })
    }

    /// Exchanges an authorization code and returns the verified identity.
    ///
    /// # Errors
    ///
    /// Fails if Google rejects the code, the response carries no `id_token`,
    /// or the id token's audience, issuer or expiry do not check out.
    pub async fn exchange_code(&self, grant: &AuthorizationGrant) -> ApiResult<Identity> {
        let redirect_uri = grant
            .redirect_uri
            .as_deref()
            .unwrap_or(&self.config.redirect_uri);

        let mut params = vec![
            ("client_id", self.config.credentials.client_id.as_str()),
            ("client_secret", self.config.credentials.client_secret.as_str()),
            ("code", grant.code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(verifier) = grant.code_verifier.as_deref() {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ApiError::network("token exchange request failed").with_source(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network("failed to read token response").with_source(e))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(ApiError::authentication(format!(
                "token exchange rejected: {}",
                reason
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ApiError::invalid_response("invalid token response").with_source(e)
        })?;

        let id_token = token_response
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::authentication("token response has no id_token"))?;

        let identity = verify_id_token(&id_token, &self.config.credentials.client_id, Utc::now())?;
        info!(subject = %identity.subject, "verified Google identity");
        Ok(identity)
    }

    /// Binds a TCP listener on the first available port in the range.
    fn bind_loopback_server(port_range: (u16, u16)) -> ApiResult<(TcpListener, u16)> {
        for port in port_range.0..=port_range.1 {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                debug!("bound loopback server on port {}", port);
                return Ok((listener, port));
            }
        }
        Err(ApiError::configuration(format!(
            "no available port in range {}-{}",
            port_range.0, port_range.1
        )))
    }

    /// Waits for the OAuth callback and extracts code and state.
    fn wait_for_callback(listener: TcpListener) -> ApiResult<(String, String)> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        if let Some(result) = handle_callback(stream) {
                            let _ = tx.send(result);
                            return;
                        }
                    }
                    Err(e) => error!("failed to accept connection: {}", e),
                }
            }
        });

        match rx.recv_timeout(CALLBACK_TIMEOUT) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(ApiError::authentication("OAuth callback timeout"))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(ApiError::internal("callback channel disconnected"))
            }
        }
    }
}

/// Handles one HTTP request on the callback server.
///
/// Returns `None` for requests that are not the callback (e.g. favicon).
fn handle_callback(mut stream: TcpStream) -> Option<ApiResult<(String, String)>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let result = parse_callback_request(&request_line)?;

    let response = if result.is_ok() {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
        <html><body><h1>Signed in to Pulseboard</h1>\
        <p>You can close this window and return to the terminal.</p></body></html>"
    } else {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
        <html><body><h1>Sign-in Failed</h1>\
        <p>You can close this window.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// Parses `GET /callback?code=...&state=... HTTP/1.1`.
fn parse_callback_request(request_line: &str) -> Option<ApiResult<(String, String)>> {
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let path = parts.next()?;
    let query = path.strip_prefix("/callback")?;
    let query = query.strip_prefix('?').unwrap_or_default();

    let mut code = None;
    let mut state = None;
    let mut error = None;

    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            let value = urlencoding::decode(value).unwrap_or_default().into_owned();
            match key {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => error = Some(value),
                _ => {}
            }
        }
    }

    if let Some(error) = error {
        return Some(Err(ApiError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    match code {
        Some(c) if !c.is_empty() => Some(Ok((c, state.unwrap_or_default()))),
        _ => Some(Err(ApiError::authentication(
            "missing authorization code in callback",
        ))),
    }
}

/// PKCE flow state (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    /// High-entropy random code verifier.
    pub verifier: String,
    /// SHA-256 of the verifier, base64url encoded.
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        let state = random_token(16);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Builds the Google authorization URL.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&prompt=select_account",
            GOOGLE_AUTH_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Successful response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Error response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorCode;
    use crate::google::config::OAuthCredentials;
    use crate::google::identity::tests::{CLIENT_ID, claims, make_token};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GoogleOAuthClient {
        let config = GoogleConfig::new(OAuthCredentials::new(CLIENT_ID, "s3cret"))
            .with_redirect_uri("https://app.example.com/oauth");
        GoogleOAuthClient::new(config)
            .unwrap()
            .with_token_url(format!("{}/token", server.uri()))
    }

    fn valid_id_token() -> String {
        make_token(claims(Utc::now().timestamp() + 3600))
    }

    #[test]
    fn pkce_verifier_length() {
        let flow = PkceFlow::new();
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_is_deterministic() {
        assert_eq!(
            PkceFlow::compute_challenge("verifier"),
            PkceFlow::compute_challenge("verifier")
        );
        assert_ne!(PkceFlow::new().state, PkceFlow::new().state);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            CLIENT_ID,
            "http://127.0.0.1:8765/callback",
            &["openid".to_string(), "email".to_string()],
        );

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8765%2Fcallback"));
        assert!(url.contains("scope=openid%20email"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("response_type=code"));
    }

    #[test]
    fn callback_parsing() {
        let ok = parse_callback_request("GET /callback?code=4%2Fabc&state=xyz HTTP/1.1\r\n");
        assert_eq!(ok.unwrap().unwrap(), ("4/abc".to_string(), "xyz".to_string()));

        let denied = parse_callback_request("GET /callback?error=access_denied HTTP/1.1");
        assert!(denied.unwrap().is_err());

        let missing = parse_callback_request("GET /callback HTTP/1.1");
        assert!(missing.unwrap().is_err());

        assert!(parse_callback_request("GET /favicon.ico HTTP/1.1").is_none());
        assert!(parse_callback_request("POST /callback?code=x HTTP/1.1").is_none());
    }

    #[tokio::test]
    async fn exchange_code_returns_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=4%2Fabc"))
            .and(body_string_contains(
                "redirect_uri=https%3A%2F%2Fapp.example.com%2Foauth",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "id_token": valid_id_token(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = client(&server)
            .exchange_code(&AuthorizationGrant::from_code("4/abc"))
            .await
            .unwrap();
        assert_eq!(identity.subject, "1234567890");
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn exchange_sends_verifier_and_grant_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code_verifier=v123"))
            .and(body_string_contains(
                "redirect_uri=http%3A%2F%2F127.0.0.1%3A8770%2Fcallback",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id_token": valid_id_token() })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let grant = AuthorizationGrant {
            code: "c".to_string(),
            redirect_uri: Some("http://127.0.0.1:8770/callback".to_string()),
            code_verifier: Some("v123".to_string()),
        };
        assert!(client(&server).exchange_code(&grant).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_code_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request",
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .exchange_code(&AuthorizationGrant::from_code("used"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::AuthenticationFailed);
        assert!(err.message().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn missing_id_token_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "ya29.token" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .exchange_code(&AuthorizationGrant::from_code("c"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::AuthenticationFailed);
        assert!(err.message().contains("id_token"));
    }

    #[tokio::test]
    async fn id_token_for_another_client_fails() {
        let server = MockServer::start().await;
        let mut other = claims(Utc::now().timestamp() + 3600);
        other["aud"] = serde_json::json!("someone-else.apps.googleusercontent.com");
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id_token": make_token(other) })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .exchange_code(&AuthorizationGrant::from_code("c"))
            .await
            .unwrap_err();
        assert!(err.message().contains("audience"));
    }

    #[test]
    fn grant_serde_skips_empty_fields() {
        let json = serde_json::to_string(&AuthorizationGrant::from_code("abc")).unwrap();
        assert_eq!(json, r#"{"code":"abc"}"#);
    }
}
