//! Google sign-in bridge.
//!
//! The CLI obtains an authorization code through the browser flow
//! ([`GoogleOAuthClient::authorize`]). The code is then redeemed once, either
//! by the Pulseboard backend (forwarded through
//! [`BackendClient::google_session`](crate::BackendClient::google_session)) or
//! locally with [`GoogleOAuthClient::exchange_code`], which yields the
//! [`Identity`] asserted by Google's id token.
//!
//! # Example
//!
//! ```ignore
//! use pulseboard_api::google::{GoogleConfig, GoogleOAuthClient, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::new(
//!     "your-client-id.apps.googleusercontent.com",
//!     "your-client-secret",
//! );
//! let client = GoogleOAuthClient::new(GoogleConfig::new(credentials))?;
//!
//! let grant = client.authorize().await?;
//! let identity = client.exchange_code(&grant).await?;
//! println!("signed in as {}", identity.subject);
//! ```

mod config;
mod identity;
mod oauth;

pub use config::{GoogleConfig, OAuthCredentials};
pub use identity::{Audience, GOOGLE_ISSUERS, IdTokenClaims, Identity, verify_id_token};
pub use oauth::{AuthorizationGrant, GoogleOAuthClient, PkceFlow};
