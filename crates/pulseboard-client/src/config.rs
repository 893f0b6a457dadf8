//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/pulseboard/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pulseboard_api::{BackendConfig, GoogleConfig, OAuthCredentials, SessionStore};
use pulseboard_server::SchedulerConfig;

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the pulseboard CLI and daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub backend: BackendSettings,

    /// Google sign-in settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleSettings>,

    pub feed: FeedSettings,

    /// Daemon and connection settings.
    pub server: ServerSettings,
}

/// Where the Pulseboard backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Where the session token is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_path: Option<PathBuf>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: BackendConfig::DEFAULT_BASE_URL.to_string(),
            timeout_secs: BackendConfig::DEFAULT_TIMEOUT_SECS,
            session_path: None,
        }
    }
}

impl BackendSettings {
    pub fn to_backend_config(&self) -> Result<BackendConfig, String> {
        let config = BackendConfig::new(&self.base_url).map_err(|e| e.to_string())?;
        Ok(config.with_timeout(Duration::from_secs(self.timeout_secs)))
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(
            self.session_path
                .clone()
                .unwrap_or_else(SessionStore::default_path),
        )
    }
}

/// Feed display defaults, overridable from the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Maximum cards per section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Only show events from followed organizers.
    pub followed_only: bool,

    /// Maximum title length (truncated with ellipsis).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_title_length: Option<usize>,
}

/// Daemon and connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Path to the daemon socket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Connection timeout in seconds.
    pub timeout: u64,

    /// Seconds between background reloads.
    pub refresh_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            timeout: 5,
            refresh_interval_secs: 300,
        }
    }
}

impl ServerSettings {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(Duration::from_secs(self.refresh_interval_secs.max(10)))
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulseboard")
    }

    /// Checks every section, resolving secrets on the way.
    pub fn validate(&self) -> Result<(), String> {
        self.backend.to_backend_config()?;

        if self.server.timeout == 0 {
            return Err("server.timeout must be greater than zero".to_string());
        }
        if self.feed.limit == Some(0) {
            return Err("feed.limit must be greater than zero".to_string());
        }

        if let Some(ref google) = self.google {
            google.to_google_config()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GoogleSettings (in config.toml, including credentials)
// ---------------------------------------------------------------------------

/// Google sign-in settings.
///
/// Credentials (`client_id`, `client_secret`) are stored inline and support
/// secret references (`pass::…`, `env::…`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Redirect URI for codes obtained outside the browser flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Loopback ports tried by the browser flow, as `[first, last]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<(u16, u16)>,
}

impl GoogleSettings {
    /// Resolves credentials and builds the sign-in configuration.
    pub fn to_google_config(&self) -> Result<GoogleConfig, String> {
        let mut config = GoogleConfig::new(self.resolve_credentials()?);

        if let Some((start, end)) = self.port_range {
            config = config
                .with_loopback_port_range(start, end)
                .with_redirect_uri(GoogleConfig::loopback_redirect_uri(start));
        }
        if let Some(ref uri) = self.redirect_uri {
            config = config.with_redirect_uri(uri);
        }

        config.validate()?;
        Ok(config)
    }

    /// Resolves Google OAuth credentials from inline fields.
    ///
    /// Both `client_id` and `client_secret` must be set. Each value is passed
    /// through `secret::resolve()` to expand `pass::` and `env::` references.
    pub(crate) fn resolve_credentials(&self) -> Result<OAuthCredentials, String> {
        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                 client_secret = \"YOUR_SECRET\"\n\n  \
                 Or run: pulseboard auth google --credentials-file <path>",
                ClientConfig::default_path().display()
            )
        })?;

        let raw_secret = self.client_secret.as_deref().ok_or_else(|| {
            "client_secret is missing from [google] section in config.toml".to_string()
        })?;

        let resolved_id = crate::secret::resolve(raw_id)
            .map_err(|e| format!("failed to resolve client_id: {}", e))?;
        let resolved_secret = crate::secret::resolve(raw_secret)
            .map_err(|e| format!("failed to resolve client_secret: {}", e))?;

        Ok(OAuthCredentials::new(resolved_id, resolved_secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.backend.timeout_secs, 15);
        assert_eq!(config.server.timeout, 5);
        assert_eq!(config.server.refresh_interval_secs, 300);
        assert!(config.google.is_none());
        assert!(!config.feed.followed_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_config_parses() {
        let config: ClientConfig = toml::from_str(
            r#"
[backend]
base_url = "https://pulse.example.com"
timeout_secs = 5

[google]
client_id = "toml-id.apps.googleusercontent.com"
client_secret = "toml-secret"
port_range = [9000, 9005]

[feed]
limit = 3
followed_only = true

[server]
socket_path = "/tmp/pb.sock"
refresh_interval_secs = 60
"#,
        )
        .unwrap();

        let backend = config.backend.to_backend_config().unwrap();
        assert_eq!(
            backend.endpoint("/api/users/me"),
            "https://pulse.example.com/api/users/me"
        );
        assert_eq!(backend.timeout, Duration::from_secs(5));
        assert_eq!(config.feed.limit, Some(3));
        assert_eq!(config.server.socket_path, Some(PathBuf::from("/tmp/pb.sock")));
        assert_eq!(
            config.server.scheduler_config().sync_interval,
            Duration::from_secs(60)
        );

        let google = config.google.unwrap().to_google_config().unwrap();
        assert_eq!(google.loopback_port_range, (9000, 9005));
        assert_eq!(google.redirect_uri, "http://127.0.0.1:9000/callback");
    }

    #[test]
    fn explicit_redirect_uri_wins() {
        let settings = GoogleSettings {
            client_id: Some("id.apps.googleusercontent.com".into()),
            client_secret: Some("secret".into()),
            redirect_uri: Some("https://pulse.example.com/oauth".into()),
            port_range: Some((9000, 9001)),
        };
        let config = settings.to_google_config().unwrap();
        assert_eq!(config.redirect_uri, "https://pulse.example.com/oauth");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ClientConfig::default();
        config.backend.base_url = "ftp://nope".into();
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.feed.limit = Some(0);
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.google = Some(GoogleSettings::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_credentials_plain_text() {
        let settings = GoogleSettings {
            client_id: Some("test-id.apps.googleusercontent.com".to_string()),
            client_secret: Some("test-secret".to_string()),
            ..Default::default()
        };
        let creds = settings.resolve_credentials().unwrap();
        assert_eq!(creds.client_id, "test-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn resolve_credentials_env_prefix() {
        unsafe {
            std::env::set_var("_PB_TEST_CLIENT_ID", "env-id.apps.googleusercontent.com");
            std::env::set_var("_PB_TEST_CLIENT_SECRET", "env-secret");
        }

        let settings = GoogleSettings {
            client_id: Some("env::_PB_TEST_CLIENT_ID".to_string()),
            client_secret: Some("env::_PB_TEST_CLIENT_SECRET".to_string()),
            ..Default::default()
        };
        let creds = settings.resolve_credentials().unwrap();
        assert_eq!(creds.client_id, "env-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "env-secret");

        unsafe {
            std::env::remove_var("_PB_TEST_CLIENT_ID");
            std::env::remove_var("_PB_TEST_CLIENT_SECRET");
        }
    }

    #[test]
    fn resolve_credentials_missing_parts() {
        let settings = GoogleSettings {
            client_secret: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(
            settings
                .resolve_credentials()
                .unwrap_err()
                .contains("credentials not found")
        );

        let settings = GoogleSettings {
            client_id: Some("id.apps.googleusercontent.com".to_string()),
            ..Default::default()
        };
        assert!(settings.resolve_credentials().unwrap_err().contains("client_secret"));
    }

    #[test]
    fn dump_roundtrips_through_toml() {
        let mut config = ClientConfig::default();
        config.feed.limit = Some(4);
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.feed.limit, Some(4));
        assert_eq!(parsed.backend.base_url, config.backend.base_url);
    }
}
