//! Google id token claims and the verified identity they produce.
//!
//! Only the claims are checked here (audience, issuer, expiry). The token
//! signature is not verified against Google's key set.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ApiError, ApiResult};

/// Issuers Google uses in id tokens.
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// The verified identity of a Google account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable Google account identifier (`sub`).
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Google Workspace domain (`hd`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_domain: Option<String>,
}

/// Claims of a Google id token payload.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub aud: Audience,
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub hd: Option<String>,
}

/// The `aud` claim: a single client id or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|a| a == client_id),
        }
    }
}

fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.eq_ignore_ascii_case("true"),
    })
}

impl IdTokenClaims {
    /// Decodes the payload segment of a JWT without checking its signature.
    pub fn decode(id_token: &str) -> ApiResult<Self> {
        let mut parts = id_token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(ApiError::authentication("id_token is not a JWT")),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ApiError::authentication("id_token payload is not base64url").with_source(e))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::authentication("id_token payload has invalid claims").with_source(e))
    }

    /// Checks audience, issuer and expiry.
    pub fn validate(&self, client_id: &str, now: DateTime<Utc>) -> ApiResult<()> {
        if !self.aud.contains(client_id) {
            return Err(ApiError::authentication(
                "id_token audience does not match client id",
            ));
        }

        if !GOOGLE_ISSUERS.contains(&self.iss.as_str()) {
            return Err(ApiError::authentication(format!(
                "id_token issued by unexpected issuer {:?}",
                self.iss
            )));
        }

        if self.exp <= now.timestamp() {
            return Err(ApiError::authentication("id_token has expired"));
        }

        Ok(())
    }

    pub fn into_identity(self) -> Identity {
        Identity {
            subject: self.sub,
            email: self.email,
            email_verified: self.email_verified,
            name: self.name,
            picture: self.picture,
            hosted_domain: self.hd,
        }
    }
}

/// Decodes and validates an id token, returning the identity it asserts.
pub fn verify_id_token(id_token: &str, client_id: &str, now: DateTime<Utc>) -> ApiResult<Identity> {
    let claims = IdTokenClaims::decode(id_token)?;
    claims.validate(client_id, now)?;
    Ok(claims.into_identity())
}
