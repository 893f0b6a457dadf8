//! The `Backend` trait: what the feed daemon needs from the backend.
//!
//! The daemon depends on this trait rather than on [`BackendClient`] so that
//! loads and logins can be driven by fakes in tests.

use std::future::Future;
use std::pin::Pin;

use pulseboard_core::{Event, Viewer};

use crate::client::BackendClient;
use crate::error::{ApiError, ApiErrorCode, ApiResult};
use crate::google::AuthorizationGrant;
use crate::session::Session;

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Data and session calls against the Pulseboard backend.
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn fetch_profile(&self) -> BoxFuture<'_, ApiResult<Viewer>>;

    fn fetch_event_feed(&self) -> BoxFuture<'_, ApiResult<Vec<Event>>>;

    fn google_session<'a>(
        &'a self,
        grant: &'a AuthorizationGrant,
    ) -> BoxFuture<'a, ApiResult<Session>>;

    fn login<'a>(&'a self, email: &'a str, password: &'a str)
    -> BoxFuture<'a, ApiResult<Session>>;
}

impl Backend for BackendClient {
    fn name(&self) -> &str {
        "backend"
    }

    fn fetch_profile(&self) -> BoxFuture<'_, ApiResult<Viewer>> {
        Box::pin(BackendClient::fetch_profile(self))
    }

    fn fetch_event_feed(&self) -> BoxFuture<'_, ApiResult<Vec<Event>>> {
        Box::pin(BackendClient::fetch_event_feed(self))
    }

    fn google_session<'a>(
        &'a self,
        grant: &'a AuthorizationGrant,
    ) -> BoxFuture<'a, ApiResult<Session>> {
        Box::pin(BackendClient::google_session(self, grant))
    }

    fn login<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, ApiResult<Session>> {
        Box::pin(BackendClient::login(self, email, password))
    }
}

/// A backend that always fails with the same error.
///
/// Used when the backend cannot be configured, so the daemon still starts and
/// reports the problem through its status.
#[derive(Debug, Clone)]
pub struct ErrorBackend {
    code: ApiErrorCode,
    message: String,
}

impl ErrorBackend {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn error<T: Send + 'static>(&self) -> BoxFuture<'_, ApiResult<T>> {
        let error = ApiError::new(self.code, self.message.clone());
        Box::pin(async move { Err(error) })
    }
}

impl Backend for ErrorBackend {
    fn name(&self) -> &str {
        "error"
    }

    fn fetch_profile(&self) -> BoxFuture<'_, ApiResult<Viewer>> {
        self.error()
    }

    fn fetch_event_feed(&self) -> BoxFuture<'_, ApiResult<Vec<Event>>> {
        self.error()
    }

    fn google_session<'a>(
        &'a self,
        _grant: &'a AuthorizationGrant,
    ) -> BoxFuture<'a, ApiResult<Session>> {
        self.error()
    }

    fn login<'a>(
        &'a self,
        _email: &'a str,
        _password: &'a str,
    ) -> BoxFuture<'a, ApiResult<Session>> {
        self.error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_backend_fails_every_call() {
        let backend = ErrorBackend::new(ApiErrorCode::ConfigurationError, "no backend URL");
        assert_eq!(backend.name(), "error");

        let err = backend.fetch_profile().await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::ConfigurationError);
        assert_eq!(err.message(), "no backend URL");

        assert!(backend.fetch_event_feed().await.is_err());
        assert!(
            backend
                .google_session(&AuthorizationGrant::from_code("c"))
                .await
                .is_err()
        );
        assert!(backend.login("a", "b").await.is_err());
    }

    #[test]
    fn backend_is_object_safe() {
        let backend: Box<dyn Backend> =
            Box::new(ErrorBackend::new(ApiErrorCode::InternalError, "x"));
        assert_eq!(backend.name(), "error");
    }
}
