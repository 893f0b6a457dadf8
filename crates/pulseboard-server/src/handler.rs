//! Request/response dispatch.
//!
//! The handler reads [`HomeState`](crate::HomeState) to answer feed and
//! status requests and forwards logins to the backend. It never writes feed
//! data itself; reloads go through the [`FeedLoader`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{Span, debug, info, warn};

use pulseboard_api::{ApiError, ApiErrorCode, AuthorizationGrant, Session, SessionStore};
use pulseboard_protocol::{ErrorCode, ErrorResponse, Request, Response};

use crate::error::{ServerError, ServerResult};
use crate::loader::{FeedLoader, LoadTrigger};
use crate::scheduler::SchedulerHandle;
use crate::signals::ShutdownHandle;
use crate::socket::Connection;
use crate::state::SharedState;

/// Shown for any failed email login the backend gave no message for.
pub const LOGIN_FAILED: &str = "Login failed.";

/// Request handler shared by all connections.
pub struct RequestHandler {
    loader: Arc<FeedLoader>,
    sessions: Option<SessionStore>,
    scheduler: Option<SchedulerHandle>,
    shutdown: Option<ShutdownHandle>,
}

impl RequestHandler {
    pub fn new(loader: Arc<FeedLoader>) -> Self {
        Self {
            loader,
            sessions: None,
            scheduler: None,
            shutdown: None,
        }
    }

    /// Persists sessions from successful logins.
    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Routes `Refresh` through the scheduler so its cooldown applies.
    pub fn with_scheduler(mut self, handle: SchedulerHandle) -> Self {
        self.scheduler = Some(handle);
        self
    }

    pub fn with_shutdown(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = Some(handle);
        self
    }

    fn state(&self) -> &SharedState {
        self.loader.state()
    }

    /// Handles a single request and returns the response.
    #[tracing::instrument(skip_all, fields(request_type = request.kind(), duration_ms))]
    pub async fn handle(&self, request: &Request) -> Response {
        let start = std::time::Instant::now();

        let response = match request {
            Request::Ping => Response::Pong,
            Request::Status => {
                let state = self.state().read().await;
                Response::status(state.status_info(self.loader.is_loading()))
            }
            Request::GetFeed {
                limit,
                followed_only,
            } => {
                let state = self.state().read().await;
                let feed = state.feed_view(*limit, *followed_only);
                debug!(
                    live = feed.live.len(),
                    upcoming = feed.upcoming.len(),
                    "Returning feed"
                );
                Response::feed(feed)
            }
            Request::Refresh { force } => self.refresh(*force).await,
            Request::GoogleLogin {
                code,
                redirect_uri,
                code_verifier,
            } => {
                let grant = AuthorizationGrant {
                    code: code.clone(),
                    redirect_uri: redirect_uri.clone(),
                    code_verifier: code_verifier.clone(),
                };
                match self.loader.backend().google_session(&grant).await {
                    Ok(session) => self.logged_in(session).await,
                    Err(e) => {
                        warn!(error = %e, "Google session request failed");
                        Response::error(error_code(&e), e.to_string())
                    }
                }
            }
            Request::Login { email, password } => {
                match self.loader.backend().login(email, password).await {
                    Ok(session) => self.logged_in(session).await,
                    Err(e) => {
                        warn!(error = %e, "Login failed");
                        Response::from_error(login_error(&e))
                    }
                }
            }
            Request::Shutdown => {
                info!("Handling Shutdown request");
                self.state().write().await.request_shutdown();
                if let Some(ref handle) = self.shutdown {
                    handle.trigger();
                }
                Response::Ok
            }
        };

        let duration = start.elapsed();
        if tracing::enabled!(tracing::Level::DEBUG) {
            Span::current().record("duration_ms", duration.as_millis());
            debug!(duration_ms = duration.as_millis(), "Request handled");
        }

        response
    }

    async fn refresh(&self, force: bool) -> Response {
        match self.scheduler {
            Some(ref handle) => match handle.refresh(force).await {
                Ok(()) => Response::Ok,
                Err(e) => {
                    warn!(error = %e, "Failed to send refresh command to scheduler");
                    Response::error(
                        ErrorCode::InternalError,
                        format!("failed to trigger refresh: {}", e),
                    )
                }
            },
            None => {
                self.loader.spawn(LoadTrigger::Refresh, force);
                Response::Ok
            }
        }
    }

    async fn logged_in(&self, session: Session) -> Response {
        info!(method = %session.method, "Login succeeded");
        if let Some(ref store) = self.sessions
            && let Err(e) = store.save(&session)
        {
            warn!(error = %e, "Failed to persist session");
        }
        self.loader.spawn(LoadTrigger::Login, true);
        Response::Ok
    }

    /// Serves requests on one connection until it closes.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        loop {
            match conn.read_request().await {
                Ok(Some(envelope)) => {
                    let response = self.handle(&envelope.payload).await;
                    conn.respond(&envelope.request_id, response).await?;

                    if self.state().read().await.shutdown_requested() {
                        return Err(ServerError::Shutdown);
                    }
                }
                Ok(None) => {
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Error reading request");
                    return Err(e);
                }
            }
        }
    }
}

/// Maps a backend error category to the IPC error code.
pub fn error_code(error: &ApiError) -> ErrorCode {
    match error.code() {
        ApiErrorCode::AuthenticationFailed | ApiErrorCode::AuthorizationFailed => {
            ErrorCode::AuthenticationFailed
        }
        ApiErrorCode::MissingFields => ErrorCode::InvalidRequest,
        ApiErrorCode::RateLimited => ErrorCode::RateLimited,
        ApiErrorCode::NotFound => ErrorCode::NotFound,
        ApiErrorCode::NetworkError
        | ApiErrorCode::ServerError
        | ApiErrorCode::InvalidResponse
        | ApiErrorCode::BadRequest => ErrorCode::BackendError,
        ApiErrorCode::ConfigurationError | ApiErrorCode::InternalError => {
            ErrorCode::InternalError
        }
    }
}

/// Builds the error for a failed email login.
///
/// The message is what the user sees: the backend's own message when it sent
/// one, the local validation message for missing fields, otherwise
/// [`LOGIN_FAILED`].
pub fn login_error(error: &ApiError) -> ErrorResponse {
    let message = match (error.code(), error.server_message()) {
        (ApiErrorCode::MissingFields, _) => error.message(),
        (_, Some(server)) if !server.is_empty() => server,
        _ => LOGIN_FAILED,
    };
    ErrorResponse::new(error_code(error), message)
}

/// Connection handler closure for [`SocketServer::run`](crate::SocketServer::run).
pub fn make_connection_handler(
    handler: Arc<RequestHandler>,
) -> impl Fn(Connection) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
    move |conn| {
        let handler = handler.clone();
        Box::pin(async move {
            if let Err(e) = handler.handle_connection(conn).await
                && !matches!(e, ServerError::Shutdown)
            {
                warn!(error = %e, "Connection handler error");
            }
        })
    }
}
