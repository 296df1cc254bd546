//! TCP listener feeding a worker pool.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Submit one connection handler task per accepted socket
//! - Stop accepting on the shutdown signal

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::net::handler::{ConnectionHandler, HandlerMode};
use crate::worker::{BoxError, PoolError, WorkerPool};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The pool stopped taking tasks.
    #[error("worker pool closed")]
    PoolClosed,
}

/// Accept loop for one port.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    pool: WorkerPool,
    mode: HandlerMode,
}

impl Listener {
    /// Bind `addr` and serve every connection accepted there through `pool`.
    pub async fn bind(addr: &str, pool: WorkerPool, mode: HandlerMode) -> Result<Self, ListenerError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Self::from_tcp(inner, pool, mode)
    }

    /// Wrap an already bound socket.
    pub fn from_tcp(inner: TcpListener, pool: WorkerPool, mode: HandlerMode) -> Result<Self, ListenerError> {
        let local_addr = inner.local_addr().map_err(|source| ListenerError::Bind {
            addr: "<bound socket>".to_string(),
            source,
        })?;

        tracing::info!(
            address = %local_addr,
            mode = mode.label(),
            pool = pool.name(),
            workers = pool.workers(),
            overload = %pool.overload(),
            "Listener bound"
        );

        Ok(Self {
            inner,
            local_addr,
            pool,
            mode,
        })
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        tracing::info!(address = %self.local_addr, "Listening for connections");

        loop {
            let accepted = tokio::select! {
                accepted = self.inner.accept() => accepted,
                _ = shutdown.recv() => {
                    tracing::info!(address = %self.local_addr, "Listener received shutdown signal");
                    return Ok(());
                }
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(address = %self.local_addr, error = %e, "Failed to accept connection");
                    continue;
                }
            };
            tracing::debug!(address = %self.local_addr, peer_addr = %peer, "Connection accepted");

            let handler = ConnectionHandler::new(stream, peer, self.mode.clone());
            let id = handler.id();
            let task = async move { handler.handle().await.map_err(BoxError::from) };

            // A blocked submit must not outlive the shutdown signal.
            let submitted = tokio::select! {
                submitted = self.pool.submit(task) => submitted,
                _ = shutdown.recv() => {
                    tracing::info!(
                        address = %self.local_addr,
                        connection_id = %id,
                        queued = self.pool.queued(),
                        "Listener received shutdown signal while queue full, connection dropped"
                    );
                    return Ok(());
                }
            };

            match submitted {
                Ok(()) => {}
                Err(PoolError::QueueFull) => {
                    // The task (and its socket) was dropped with the error.
                    tracing::warn!(
                        address = %self.local_addr,
                        pool = self.pool.name(),
                        connection_id = %id,
                        queued = self.pool.queued(),
                        "Worker queue full, connection dropped"
                    );
                }
                Err(PoolError::Closed) | Err(PoolError::InvalidSize) => {
                    tracing::error!(address = %self.local_addr, "Worker pool closed, listener stopping");
                    return Err(ListenerError::PoolClosed);
                }
            }
        }
    }
}
