//! Subcommand implementations.

pub mod auth;
pub mod config;
pub mod feed;
pub mod server;

use std::time::Duration;

use pulseboard_server::default_socket_path;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::socket::SocketClient;

/// Socket client for the daemon. Flags win over `[server]` settings.
pub fn socket_client(cli: &Cli, config: &ClientConfig) -> SocketClient {
    let path = cli
        .socket_path
        .clone()
        .or_else(|| config.server.socket_path.clone())
        .unwrap_or_else(default_socket_path);
    let timeout = cli.timeout.unwrap_or(config.server.timeout);
    SocketClient::new(path, Duration::from_secs(timeout))
}
