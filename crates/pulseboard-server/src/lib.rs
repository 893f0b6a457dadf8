//! Home feed daemon.
//!
//! This crate provides the pulseboard daemon that handles:
//! - Unix socket IPC for client communication
//! - Loading the viewer and event feed from the backend
//! - Periodic reloads with jitter, cooldown and backoff
//! - Forwarding logins to the backend
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pulseboard_api::{BackendClient, BackendConfig};
//! use pulseboard_server::{
//!     FeedLoader, RequestHandler, ServerConfig, SocketServer, make_connection_handler,
//!     new_shared_state,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = BackendClient::new(BackendConfig::new("http://127.0.0.1:3000")?)?;
//!     let loader = Arc::new(FeedLoader::new(Arc::new(backend), new_shared_state()));
//!     let handler = Arc::new(RequestHandler::new(loader));
//!
//!     let server = SocketServer::new(ServerConfig::default()).await?;
//!     server.run(make_connection_handler(handler)).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod handler;
mod loader;
mod pidfile;
mod scheduler;
mod signals;
mod socket;
mod state;

pub use config::{ServerConfig, default_socket_path};
pub use error::{ServerError, ServerResult};
pub use handler::{LOGIN_FAILED, RequestHandler, error_code, login_error, make_connection_handler};
pub use loader::{FeedLoader, LoadOutcome, LoadTrigger};
pub use pidfile::{PidFile, default_pid_path};
pub use scheduler::{Scheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle};
pub use signals::{ReloadSignal, ShutdownHandle, ShutdownSignal, SignalHandler};
pub use socket::{Connection, SocketServer};
pub use state::{HomeState, SharedState, new_shared_state};
