//! Server command: runs the feed daemon in the foreground, and its status.
//!
//! Start-up order:
//! - PID file (prevents duplicate instances)
//! - signal handler (SIGTERM/SIGINT for shutdown, SIGHUP to re-read the session)
//! - backend client with the stored session token
//! - feed loader and scheduler (periodic reloads)
//! - socket server (IPC with clients)

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use pulseboard_api::{ApiErrorCode, Backend, BackendClient, ErrorBackend, SessionStore};
use pulseboard_protocol::{Request, Response, StatusInfo};
use pulseboard_server::{
    FeedLoader, PidFile, RequestHandler, Scheduler, ServerConfig, SignalHandler, SocketServer,
    default_pid_path, default_socket_path, make_connection_handler, new_shared_state,
};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Starts the daemon and blocks until SIGTERM/SIGINT or a `Shutdown` request.
pub async fn run(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let _pid_file = PidFile::create(default_pid_path())?;

    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();

    let sessions = config.backend.session_store();
    let client = build_client(config, &sessions);
    let backend: Arc<dyn Backend> = match client {
        Some(ref client) => client.clone() as Arc<dyn Backend>,
        None => Arc::new(ErrorBackend::new(
            ApiErrorCode::ConfigurationError,
            "backend is not configured; check [backend] in config.toml",
        )),
    };
    info!(backend = backend.name(), "Starting feed daemon");

    let loader = Arc::new(FeedLoader::new(backend, new_shared_state()));

    let scheduler = Scheduler::new(config.server.scheduler_config());
    let scheduler_handle = scheduler.handle();

    let sync_loader = loader.clone();
    let scheduler_task = tokio::spawn(async move {
        scheduler
            .run(move |trigger, force| {
                let loader = sync_loader.clone();
                async move { loader.load(trigger, force).await.into_result() }
            })
            .await;
    });

    // SIGHUP: pick up a session written by `auth --direct`, then reload.
    let mut reload = signal_handler.reload();
    let reload_handle = scheduler_handle.clone();
    let reload_sessions = sessions.clone();
    let reload_task = tokio::spawn(async move {
        while reload.recv().await {
            info!("Reload requested");
            if let Some(ref client) = client {
                client.set_token(stored_token(&reload_sessions));
            }
            if let Err(e) = reload_handle.sync_now().await {
                warn!(error = %e, "Failed to send sync command to scheduler");
                break;
            }
        }
    });

    let socket_path = cli
        .socket_path
        .clone()
        .or_else(|| config.server.socket_path.clone())
        .unwrap_or_else(default_socket_path);
    let server = SocketServer::new(ServerConfig::new(&socket_path)).await?;
    info!(path = %socket_path.display(), "Server listening");

    let handler = RequestHandler::new(loader)
        .with_session_store(sessions)
        .with_scheduler(scheduler_handle.clone())
        .with_shutdown(signal_handler.shutdown_handle());
    let handler = make_connection_handler(Arc::new(handler));

    server
        .run_until_shutdown(handler, signal_handler.shutdown().wait())
        .await?;

    info!("Shutting down...");
    if let Err(e) = scheduler_handle.stop().await {
        warn!(error = %e, "Failed to send stop command to scheduler");
    }
    reload_task.abort();
    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler_task).await;

    info!("Server stopped");
    Ok(())
}

/// Prints the daemon's status.
pub async fn status(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let client = super::socket_client(cli, config);
    match client.call(Request::Status).await? {
        Response::Status { info } => {
            if cli.json {
                let json = serde_json::to_string_pretty(&info)
                    .map_err(|e| ClientError::Protocol(format!("failed to serialize status: {}", e)))?;
                println!("{}", json);
            } else {
                println!("{}", format_status(&info, Utc::now()));
            }
            Ok(())
        }
        other => Err(ClientError::Protocol(format!(
            "unexpected response: {:?}",
            other
        ))),
    }
}

fn build_client(config: &ClientConfig, sessions: &SessionStore) -> Option<Arc<BackendClient>> {
    let backend_config = match config.backend.to_backend_config() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid backend configuration");
            return None;
        }
    };
    match BackendClient::new(backend_config) {
        Ok(client) => Some(Arc::new(client.with_token(stored_token(sessions)))),
        Err(e) => {
            error!(error = %e, "Failed to create backend client");
            None
        }
    }
}

fn stored_token(sessions: &SessionStore) -> Option<String> {
    match sessions.load() {
        Ok(session) => session.and_then(|s| s.token),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable session file");
            None
        }
    }
}

fn format_status(info: &StatusInfo, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        format!("uptime:      {}s", info.uptime_seconds),
        format!(
            "viewer:      {}",
            info.viewer_name.as_deref().unwrap_or("(not loaded)")
        ),
        format!("events:      {}", info.event_count),
        format!("generation:  {}", info.generation),
    ];
    match info.last_load {
        Some(at) => lines.push(format!(
            "last load:   {}s ago",
            (now - at).num_seconds().max(0)
        )),
        None => lines.push("last load:   never".to_string()),
    }
    if info.load_in_flight {
        lines.push("loading:     yes".to_string());
    }
    if let Some(ref err) = info.last_error {
        lines.push(format!("last error:  {}", err));
    }
    lines.join("\n")
}
