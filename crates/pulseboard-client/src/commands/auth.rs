//! Authentication commands.
//!
//! Both sign-in methods go through the daemon by default so it can reload
//! the feed with the new session. `--direct` talks to the backend from the
//! CLI and stores the session itself.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use pulseboard_api::{
    AuthorizationGrant, BackendClient, GoogleConfig, GoogleOAuthClient, OAuthCredentials,
};
use pulseboard_protocol::{Request, Response};

use crate::cli::Cli;
use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult, LoginMethod};

/// Options for `pulseboard auth google`.
#[derive(Debug, Default)]
pub struct GoogleOptions {
    pub code: Option<String>,
    pub direct: bool,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub credentials_file: Option<PathBuf>,
}

/// Signs in with Google.
///
/// Without `--code` this runs the browser consent flow first. Credentials
/// given on the command line or via `--credentials-file` are persisted to
/// `config_path` once consent succeeds.
///
/// Every failure after credentials are resolved is reported with the same
/// generic message; the cause goes to the log.
pub async fn google(
    options: GoogleOptions,
    cli: &Cli,
    config: &ClientConfig,
    config_path: &Path,
) -> ClientResult<()> {
    let grant = match options.code {
        Some(code) => AuthorizationGrant::from_code(code),
        None => {
            let (credentials, source) = resolve_google_credentials(
                options.client_id,
                options.client_secret,
                options.credentials_file,
                config.google.as_ref(),
                config_path,
            )?;
            let google_config = google_config(credentials.clone(), config.google.as_ref())?;

            println!("Starting Google sign-in...");
            println!("A browser window will open for you to authorize access.");
            println!();

            let grant = GoogleOAuthClient::new(google_config)?
                .authorize()
                .await
                .map_err(google_failed)?;

            save_credentials_to_config(
                config_path,
                &credentials.client_id,
                &credentials.client_secret,
                &source,
            );
            grant
        }
    };

    if options.direct {
        let client = BackendClient::new(config.backend.to_backend_config().map_err(ClientError::Config)?)?;
        let session = client.google_session(&grant).await.map_err(google_failed)?;
        config.backend.session_store().save(&session)?;
    } else {
        let request = Request::GoogleLogin {
            code: grant.code,
            redirect_uri: grant.redirect_uri,
            code_verifier: grant.code_verifier,
        };
        expect_ok(super::socket_client(cli, config).call(request).await).map_err(google_failed)?;
    }

    info!("Google sign-in successful");
    println!("Signed in with Google.");
    Ok(())
}

/// Exchanges a code with Google locally and prints the verified identity.
pub async fn exchange(
    code: String,
    redirect_uri: Option<String>,
    config: &ClientConfig,
) -> ClientResult<()> {
    let settings = config.google.as_ref().ok_or_else(|| {
        ClientError::Config("no [google] section in config.toml".to_string())
    })?;
    let google_config = settings.to_google_config().map_err(ClientError::Config)?;

    let grant = AuthorizationGrant {
        code,
        redirect_uri,
        code_verifier: None,
    };
    let identity = GoogleOAuthClient::new(google_config)?
        .exchange_code(&grant)
        .await
        .map_err(google_failed)?;

    println!("subject:  {}", identity.subject);
    if let Some(ref email) = identity.email {
        let verified = if identity.email_verified { "" } else { " (unverified)" };
        println!("email:    {}{}", email, verified);
    }
    if let Some(ref name) = identity.name {
        println!("name:     {}", name);
    }
    if let Some(ref domain) = identity.hosted_domain {
        println!("domain:   {}", domain);
    }
    Ok(())
}

/// Signs in with email and password.
///
/// The message shown on failure is the backend's own when it sent one.
pub async fn login(
    email: String,
    password: String,
    direct: bool,
    cli: &Cli,
    config: &ClientConfig,
) -> ClientResult<()> {
    if direct {
        let client = BackendClient::new(config.backend.to_backend_config().map_err(ClientError::Config)?)?;
        match client.login(&email, &password).await {
            Ok(session) => config.backend.session_store().save(&session)?,
            Err(e) => {
                warn!(error = %e, "Login failed");
                let response = pulseboard_server::login_error(&e);
                return Err(ClientError::login_failed(LoginMethod::Password, response.message));
            }
        }
    } else {
        let client = super::socket_client(cli, config);
        match expect_ok(client.call(Request::login(email, password)).await) {
            Ok(()) => {}
            Err(ClientError::Server(response)) => {
                return Err(ClientError::login_failed(LoginMethod::Password, response.message));
            }
            Err(e) => return Err(e),
        }
    }

    println!("Signed in.");
    Ok(())
}

fn expect_ok(response: ClientResult<Response>) -> ClientResult<()> {
    match response? {
        Response::Ok => Ok(()),
        other => Err(ClientError::Protocol(format!(
            "unexpected response: {:?}",
            other
        ))),
    }
}

fn google_failed(error: impl std::fmt::Display) -> ClientError {
    warn!(error = %error, "Google sign-in failed");
    ClientError::login_failed(LoginMethod::Google, error.to_string())
}

fn google_config(
    credentials: OAuthCredentials,
    settings: Option<&GoogleSettings>,
) -> ClientResult<GoogleConfig> {
    let mut google_config = GoogleConfig::new(credentials);
    if let Some((start, end)) = settings.and_then(|s| s.port_range) {
        google_config = google_config
            .with_loopback_port_range(start, end)
            .with_redirect_uri(GoogleConfig::loopback_redirect_uri(start));
    }
    google_config
        .validate()
        .map_err(|e| ClientError::Config(format!("invalid Google configuration: {}", e)))?;
    Ok(google_config)
}

/// Where the credentials were resolved from.
#[derive(Debug, PartialEq)]
enum CredentialSource {
    /// `--client-id`/`--client-secret` or `--credentials-file`
    Cli,
    /// Already in config.toml
    Config,
}

/// Writes credentials into the `[google]` table of `config_path`.
///
/// Only credentials from a transient source are saved, and the rest of the
/// file is left as it was.
fn save_credentials_to_config(
    config_path: &Path,
    client_id: &str,
    client_secret: &str,
    source: &CredentialSource,
) {
    if *source == CredentialSource::Config {
        return;
    }

    let content = std::fs::read_to_string(config_path).unwrap_or_default();
    let mut doc = match content.parse::<toml_edit::DocumentMut>() {
        Ok(d) => d,
        Err(e) => {
            warn!("could not parse config.toml for writing: {}", e);
            return;
        }
    };

    if !doc.contains_key("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    if let Some(google) = doc["google"].as_table_mut() {
        google["client_id"] = toml_edit::value(client_id);
        google["client_secret"] = toml_edit::value(client_secret);
    }

    if let Some(parent) = config_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!("could not create config directory {}: {}", parent.display(), e);
        return;
    }

    match std::fs::write(config_path, doc.to_string()) {
        Ok(()) => {
            info!("Credentials saved to {}", config_path.display());
            println!("Credentials saved to {}", config_path.display());
        }
        Err(e) => warn!("could not save credentials to {}: {}", config_path.display(), e),
    }
}

/// Resolves Google credentials.
///
/// Priority (highest to lowest):
/// 1. `--client-id` + `--client-secret`
/// 2. `--credentials-file` (Google Cloud Console JSON)
/// 3. `[google]` in config.toml, with secret references resolved
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    config_google: Option<&GoogleSettings>,
    config_path: &Path,
) -> ClientResult<(OAuthCredentials, CredentialSource)> {
    if let (Some(id), Some(secret)) = (&cli_client_id, &cli_client_secret) {
        return Ok((OAuthCredentials::new(id, secret), CredentialSource::Cli));
    }

    if let Some(ref path) = cli_credentials_file {
        let creds = OAuthCredentials::from_file(path).map_err(|e| {
            ClientError::Config(format!(
                "failed to load credentials from {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok((creds, CredentialSource::Cli));
    }

    if let Some(google) = config_google
        && google.client_id.is_some()
        && google.client_secret.is_some()
    {
        let creds = google.resolve_credentials().map_err(|e| {
            ClientError::Config(format!(
                "failed to resolve Google credentials from config: {}",
                e
            ))
        })?;
        return Ok((creds, CredentialSource::Config));
    }

    if cli_client_id.is_some() || cli_client_secret.is_some() {
        return Err(ClientError::Config(
            "both --client-id and --client-secret are required when providing credentials directly"
                .to_string(),
        ));
    }

    Err(ClientError::Config(format!(
        "Google credentials are required. Provide via:\n  \
         - client_id + client_secret in {}\n  \
         - --client-id and --client-secret flags\n  \
         - --credentials-file flag (path to Google Cloud Console JSON)\n  \
         - GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET env vars",
        config_path.display()
    )))
}
