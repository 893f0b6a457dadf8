//! Unix socket client for talking to the pulseboard daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use pulseboard_protocol::{Envelope, ProtocolError, Request, Response, read_frame, write_frame};

use crate::error::{ClientError, ClientResult};

/// One-request-per-connection client for the daemon socket.
#[derive(Debug, Clone)]
pub struct SocketClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// Client for the default socket path with a 5 second timeout.
    pub fn with_defaults() -> Self {
        Self::new(
            pulseboard_server::default_socket_path(),
            Duration::from_secs(5),
        )
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Sends a request and waits for the response.
    pub async fn send(&self, request: Request) -> ClientResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        debug!(
            socket = %self.socket_path.display(),
            request_id = %request_id,
            request_type = request.kind(),
            "connecting to server"
        );

        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| {
                ClientError::Connection(format!(
                    "connection timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ClientError::Connection(format!(
                    "failed to connect to {}: {} (is `pulseboard server` running?)",
                    self.socket_path.display(),
                    e
                ))
            })?;

        let envelope = Envelope::request(&request_id, request);
        tokio::time::timeout(self.timeout, write_frame(&mut stream, &envelope))
            .await
            .map_err(|_| ProtocolError::timeout("sending request"))??;

        debug!("request sent, waiting for response");

        let response: Envelope<Response> =
            tokio::time::timeout(self.timeout, read_frame(&mut stream))
                .await
                .map_err(|_| ProtocolError::timeout("reading response"))??
                .ok_or_else(|| {
                    ClientError::Protocol("server closed the connection without answering".into())
                })?;

        if response.request_id != request_id {
            warn!(
                expected = %request_id,
                received = %response.request_id,
                "response request_id mismatch"
            );
        }

        Ok(response.payload)
    }

    /// Sends a request and turns an error response into [`ClientError::Server`].
    pub async fn call(&self, request: Request) -> ClientResult<Response> {
        match self.send(request).await? {
            Response::Error { error } => Err(ClientError::Server(error)),
            other => Ok(other),
        }
    }

    /// Returns true if a daemon answers on the socket.
    pub async fn ping(&self) -> bool {
        matches!(self.send(Request::Ping).await, Ok(Response::Pong))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    #[test]
    fn socket_client_creation() {
        let client = SocketClient::new("/tmp/test.sock", Duration::from_secs(10));
        assert_eq!(client.socket_path(), Path::new("/tmp/test.sock"));
        assert!(!client.socket_exists());
    }

    #[test]
    fn default_client() {
        let client = SocketClient::with_defaults();
        assert!(client.socket_path().to_string_lossy().contains("pulseboard"));
    }

    #[tokio::test]
    async fn send_and_receive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request: Envelope<Request> = read_frame(&mut stream).await.unwrap().unwrap();
            assert_eq!(request.payload, Request::refresh(true));
            let response = Envelope::response(request.request_id, Response::Ok);
            write_frame(&mut stream, &response).await.unwrap();
        });

        let client = SocketClient::new(&path, Duration::from_secs(5));
        assert_eq!(
            client.send(Request::refresh(true)).await.unwrap(),
            Response::Ok
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn call_maps_error_responses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let listener = UnixListener::bind(&path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request: Envelope<Request> = read_frame(&mut stream).await.unwrap().unwrap();
            let response = Envelope::response(
                request.request_id,
                Response::error(pulseboard_protocol::ErrorCode::InternalError, "boom"),
            );
            write_frame(&mut stream, &response).await.unwrap();
        });

        let client = SocketClient::new(&path, Duration::from_secs(5));
        let err = client.call(Request::Status).await.unwrap_err();
        assert!(matches!(err, ClientError::Server(ref e) if e.message == "boom"));
    }

    #[tokio::test]
    async fn missing_socket_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = SocketClient::new(dir.path().join("none.sock"), Duration::from_secs(1));
        assert!(matches!(
            client.send(Request::Ping).await,
            Err(ClientError::Connection(_))
        ));
        assert!(!client.ping().await);
    }
}
