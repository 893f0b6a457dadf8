//! The `pulseboard` command-line interface.
//!
//! With no subcommand the CLI asks the running daemon for the ranked home
//! feed and prints it. `pulseboard server` runs that daemon.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;
pub mod socket;

pub use cli::Cli;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use socket::SocketClient;
