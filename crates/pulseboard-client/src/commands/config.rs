//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Prints the effective configuration as TOML.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Checks every section, including that Google secret references resolve.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;
    if config.google.is_some() {
        println!("Google credentials are valid.");
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Shows where configuration and session live.
pub fn path(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    println!("config:  {}", path.display());
    println!("session: {}", config.backend.session_store().path().display());
    Ok(())
}
