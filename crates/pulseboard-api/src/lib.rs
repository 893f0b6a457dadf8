//! Pulseboard backend client and Google sign-in bridge.
//!
//! - [`BackendClient`]: the REST calls for profile, event feed and sessions
//! - [`Backend`]: the object-safe seam the feed daemon is written against
//! - [`google`]: browser authorization and server-side code exchange
//! - [`SessionStore`]: the persisted bearer token
//! - [`ApiError`]: one error type with a coarse [`ApiErrorCode`]
//!
//! ```text
//!   browser ──code──▶ pulseboard CLI ──code──▶ backend /api/auth/google
//!                                                  │
//!                                    GoogleOAuthClient::exchange_code
//!                                                  │
//!                                                  ▼
//!                                         verified Identity
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod google;
pub mod profile;
pub mod session;

pub use backend::{Backend, BoxFuture, ErrorBackend};
pub use client::BackendClient;
pub use config::BackendConfig;
pub use error::{ApiError, ApiErrorCode, ApiResult};
pub use google::{AuthorizationGrant, GoogleConfig, GoogleOAuthClient, Identity, OAuthCredentials};
pub use session::{Session, SessionStore};
