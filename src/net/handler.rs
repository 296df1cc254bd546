//! Per-connection handling.
//!
//! # Responsibilities
//! - Answer directly when running as a backend
//! - Otherwise route on the request line, forward the request head to the
//!   chosen backend and relay its response back verbatim
//! - Relieve the routed backend exactly once, at hand-off
//! - Close the client socket on every exit path
//!
//! No timeouts are applied: a stalled peer keeps its worker busy until the
//! peer closes or errors.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::load_balancer::{BackendAddress, Router};
use crate::net::connection::{ConnectionId, ConnectionState};
use crate::observability::metrics;

/// Error that aborts a single connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("client closed the connection before sending a request line")]
    EmptyRequest,
    #[error("no backend available")]
    NoBackend,
    #[error("failed to connect to backend {addr}: {source}")]
    Connect {
        addr: BackendAddress,
        #[source]
        source: io::Error,
    },
    #[error("client I/O failed: {0}")]
    Client(#[source] io::Error),
    #[error("backend {addr} I/O failed: {source}")]
    Backend {
        addr: BackendAddress,
        #[source]
        source: io::Error,
    },
    #[error("relaying response from {addr} failed: {source}")]
    Relay {
        addr: BackendAddress,
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionError::EmptyRequest => "empty_request",
            ConnectionError::NoBackend => "no_backend",
            ConnectionError::Connect { .. } => "connect",
            ConnectionError::Client(_) => "client_io",
            ConnectionError::Backend { .. } => "backend_io",
            ConnectionError::Relay { .. } => "relay_io",
        }
    }
}

/// How a listener's connections are served.
#[derive(Debug, Clone)]
pub enum HandlerMode {
    /// Reply locally with a fixed greeting naming this server.
    Direct { server_name: Arc<str> },
    /// Route each request to a backend and relay.
    Forward { router: Arc<Router> },
}

impl HandlerMode {
    pub fn direct(server_name: impl Into<String>) -> Self {
        HandlerMode::Direct {
            server_name: Arc::from(server_name.into()),
        }
    }

    pub fn forward(router: Arc<Router>) -> Self {
        HandlerMode::Forward { router }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HandlerMode::Direct { .. } => "direct",
            HandlerMode::Forward { .. } => "forward",
        }
    }
}

/// State for one accepted connection.
#[derive(Debug)]
pub struct ConnectionHandler {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    mode: HandlerMode,
    state: ConnectionState,
}

impl ConnectionHandler {
    pub fn new(stream: TcpStream, peer: SocketAddr, mode: HandlerMode) -> Self {
        Self {
            id: ConnectionId::new(),
            stream,
            peer,
            mode,
            state: ConnectionState::Accepted,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Serve the connection to completion.
    pub async fn handle(self) -> Result<(), ConnectionError> {
        let span = tracing::debug_span!("connection", id = %self.id, peer = %self.peer);
        self.run().instrument(span).await
    }

    async fn run(mut self) -> Result<(), ConnectionError> {
        metrics::record_connection(self.mode.label());

        let next = match self.mode {
            HandlerMode::Direct { .. } => ConnectionState::DirectResponse,
            HandlerMode::Forward { .. } => ConnectionState::RouteAndForward,
        };
        self.transition(next);

        let result = match &self.mode {
            HandlerMode::Direct { server_name } => respond_directly(&mut self.stream, server_name).await,
            HandlerMode::Forward { router } => route_and_forward(&mut self.stream, router).await,
        };

        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(error = %e, "Client socket already gone");
        }
        self.transition(ConnectionState::Closed);

        match &result {
            Ok(()) => tracing::debug!("Connection served"),
            Err(e) => metrics::record_connection_error(e.kind()),
        }
        result
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(self.state.can_transition_to(next), "{} -> {next}", self.state);
        tracing::trace!(from = %self.state, to = %next, "Connection state change");
        self.state = next;
    }
}

/// Body and framing of the local greeting.
pub fn direct_response(server_name: &str) -> String {
    let body = format!("Hello from Server {server_name}");
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Routing key for a request line: the line without its terminator.
pub fn routing_key(line: &[u8]) -> String {
    String::from_utf8_lossy(trim_line_ending(line)).into_owned()
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// A blank line ends the request head.
fn is_blank(line: &[u8]) -> bool {
    trim_line_ending(line).is_empty()
}

async fn respond_directly(stream: &mut TcpStream, server_name: &str) -> Result<(), ConnectionError> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(ConnectionError::Client)?;
        if n == 0 || is_blank(&line) {
            break;
        }
        tracing::trace!(line = %String::from_utf8_lossy(trim_line_ending(&line)), "Request line");
    }

    writer
        .write_all(direct_response(server_name).as_bytes())
        .await
        .map_err(ConnectionError::Client)?;
    writer.flush().await.map_err(ConnectionError::Client)?;

    tracing::debug!(server = %server_name, "Sent direct response");
    Ok(())
}

/// One routed request whose load has not been given back yet.
///
/// Dropping it without [`Assignment::hand_off`] relieves the backend too, so
/// an aborted forward never leaves load attributed to a backend.
struct Assignment<'a> {
    router: &'a Router,
    target: BackendAddress,
    relieved: bool,
}

impl<'a> Assignment<'a> {
    fn route(router: &'a Router, key: &str) -> Option<Self> {
        router.route(key).map(|target| Self {
            router,
            target,
            relieved: false,
        })
    }

    fn hand_off(mut self) {
        self.relieve();
    }

    fn relieve(&mut self) {
        if !self.relieved {
            self.router.relieve(&self.target);
            self.relieved = true;
        }
    }
}

impl Drop for Assignment<'_> {
    fn drop(&mut self) {
        if !self.relieved {
            tracing::debug!(backend = %self.target, "Forward aborted before hand-off");
            self.relieve();
        }
    }
}

async fn route_and_forward(stream: &mut TcpStream, router: &Router) -> Result<(), ConnectionError> {
    let (client_read, mut client_write) = stream.split();
    let mut client_reader = BufReader::new(client_read);

    let mut first = Vec::new();
    let n = client_reader
        .read_until(b'\n', &mut first)
        .await
        .map_err(ConnectionError::Client)?;
    if n == 0 {
        return Err(ConnectionError::EmptyRequest);
    }

    let key = routing_key(&first);
    let assignment = Assignment::route(router, &key).ok_or(ConnectionError::NoBackend)?;
    let target = assignment.target.clone();
    metrics::record_route(target.as_str());
    tracing::debug!(backend = %target, request = %key, "Routing request");

    let mut backend = TcpStream::connect(target.as_str())
        .await
        .map_err(|source| ConnectionError::Connect {
            addr: target.clone(),
            source,
        })?;
    let (mut backend_read, mut backend_write) = backend.split();
    let backend_err = |source: io::Error| ConnectionError::Backend {
        addr: target.clone(),
        source,
    };

    backend_write.write_all(&first).await.map_err(&backend_err)?;
    if !is_blank(&first) {
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = client_reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(ConnectionError::Client)?;
            if n == 0 {
                break;
            }
            backend_write.write_all(&line).await.map_err(&backend_err)?;
            if is_blank(&line) {
                break;
            }
        }
    }
    backend_write.flush().await.map_err(&backend_err)?;

    // Hand-off: the backend has the whole request head.
    assignment.hand_off();
    tracing::trace!(backend = %target, "Request handed off");

    let relayed = tokio::io::copy(&mut backend_read, &mut client_write)
        .await
        .map_err(|source| ConnectionError::Relay {
            addr: target.clone(),
            source,
        })?;
    client_write.flush().await.map_err(ConnectionError::Client)?;

    tracing::debug!(backend = %target, bytes = relayed, "Response relayed");
    Ok(())
}
