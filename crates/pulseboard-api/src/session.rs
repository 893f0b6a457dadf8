//! Backend session tokens and their on-disk storage.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};

/// A session established with the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for later calls, if the backend issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// How the session was obtained (`google` or `password`).
    pub method: String,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(method: impl Into<String>, token: Option<String>) -> Self {
        Self {
            token,
            method: method.into(),
            established_at: Utc::now(),
        }
    }

    /// Reads the token out of a session endpoint body.
    ///
    /// Accepts `{"token": ...}` or `{"data": {"token": ...}}`. Anything else,
    /// including an empty body, is a session without a token.
    pub fn from_body(method: impl Into<String>, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Body {
            #[serde(default)]
            token: Option<String>,
            #[serde(default)]
            data: Option<Inner>,
        }
        #[derive(Deserialize)]
        struct Inner {
            #[serde(default)]
            token: Option<String>,
        }

        let token = serde_json::from_str::<Body>(body)
            .ok()
            .and_then(|b| b.token.or(b.data.and_then(|d| d.token)))
            .filter(|t| !t.is_empty());
        Self::new(method, token)
    }
}

/// File-backed session storage.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.local/share/pulseboard/session.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".local").join("share"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulseboard")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored session, if any.
    pub fn load(&self) -> ApiResult<Option<Session>> {
        if !self.path.exists() {
            debug!("no session file at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ApiError::configuration(format!("failed to read session file {:?}", self.path))
                .with_source(e)
        })?;

        let session = serde_json::from_str(&content).map_err(|e| {
            ApiError::configuration(format!("failed to parse session file {:?}", self.path))
                .with_source(e)
        })?;
        Ok(Some(session))
    }

    /// Writes the session atomically with owner-only permissions.
    pub fn save(&self, session: &Session) -> ApiResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ApiError::configuration("failed to create session directory").with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(session)
            .map_err(|e| ApiError::internal("failed to serialize session").with_source(e))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).map_err(|e| {
            ApiError::configuration("failed to write session file").with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                ApiError::configuration("failed to restrict session file").with_source(e)
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ApiError::configuration("failed to rename session file").with_source(e)
        })?;

        info!(method = %session.method, "saved session to {:?}", self.path);
        Ok(())
    }

    /// Removes the stored session.
    pub fn clear(&self) -> ApiResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::configuration("failed to remove session file").with_source(e)),
        }
    }
}
