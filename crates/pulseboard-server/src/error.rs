//! Server error types.

use std::io;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the daemon.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (socket, file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, encoding, etc.).
    #[error("Protocol error: {0}")]
    Protocol(#[from] pulseboard_protocol::ProtocolError),

    /// Backend client could not be set up.
    #[error("Backend error: {0}")]
    Api(#[from] pulseboard_api::ApiError),

    /// Socket path already in use.
    #[error("Socket path already in use: {path}")]
    SocketInUse { path: String },

    /// Socket path parent directory does not exist.
    #[error("Socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },

    /// Another daemon holds the PID file.
    #[error("Daemon already running as PID {pid} ({path})")]
    AlreadyRunning { path: String, pid: u32 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Shutdown requested by a client.
    #[error("Server shutdown requested")]
    Shutdown,
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }

    pub fn already_running(path: impl Into<String>, pid: u32) -> Self {
        Self::AlreadyRunning {
            path: path.into(),
            pid,
        }
    }
}
