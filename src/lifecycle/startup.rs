//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the in-process echo backends
//! - Build the router and register every backend
//! - Bind the balancer listener and spawn its accept loop
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Backends start before the balancer so the first request has a target

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{BalancerConfig, LocalBackendsConfig};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{AddressError, BackendAddress, Router};
use crate::net::{HandlerMode, Listener, ListenerError};
use crate::worker::{OverloadPolicy, PoolError, WorkerPool};

/// Queue size of each in-process echo backend.
const LOCAL_BACKEND_QUEUE: usize = 1024;

/// Error type for startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("invalid backend address: {0}")]
    Address(#[from] AddressError),
    #[error("{count} local backends starting at port {base_port} run past port 65535")]
    PortRange { base_port: u16, count: u16 },
}

/// A running balancer listener.
#[derive(Debug)]
pub struct Balancer {
    /// Address the balancer accepts on.
    pub local_addr: SocketAddr,
    /// Router shared by the balancer's handlers.
    pub router: Arc<Router>,
    /// Accept loop task.
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

/// Start `config.count` echo backends on consecutive ports.
///
/// Each answers with `Hello from Server <port>`. A `base_port` of 0 gives
/// every backend an ephemeral port. Returns the addresses to register.
pub async fn spawn_local_backends(
    config: &LocalBackendsConfig,
    shutdown: &Shutdown,
) -> Result<Vec<BackendAddress>, StartupError> {
    let ports = local_ports(config.base_port, config.count)?;
    let mut addrs = Vec::with_capacity(ports.len());

    for port in ports {
        let bind_addr = format!("{}:{}", config.host, port);
        let inner = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let port = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?
            .port();

        let pool = WorkerPool::new(
            format!("backend-{port}"),
            config.workers,
            LOCAL_BACKEND_QUEUE,
            OverloadPolicy::Block,
        )?;
        let listener = Listener::from_tcp(inner, pool, HandlerMode::direct(port.to_string()))?;
        let stop = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = listener.run(stop).await {
                tracing::error!(port, error = %e, "Local backend stopped");
            }
        });

        addrs.push(format!("{}:{}", config.host, port).parse()?);
    }

    if !addrs.is_empty() {
        tracing::info!(count = addrs.len(), "Local backends started");
    }
    Ok(addrs)
}

/// Ports to bind, checked before anything is bound.
fn local_ports(base_port: u16, count: u16) -> Result<Vec<u16>, StartupError> {
    if base_port == 0 {
        return Ok(vec![0; usize::from(count)]);
    }
    (0..count)
        .map(|i| {
            base_port
                .checked_add(i)
                .ok_or(StartupError::PortRange { base_port, count })
        })
        .collect()
}

/// Build the router, register backends and start the balancer listener.
///
/// `extra_backends` are registered after the ones named in `config.backends`.
pub async fn start_balancer(
    config: &BalancerConfig,
    extra_backends: &[BackendAddress],
    shutdown: &Shutdown,
) -> Result<Balancer, StartupError> {
    let router = Arc::new(Router::new(config.strategy));
    for backend in &config.backends {
        router.add_server(backend.address.parse()?);
    }
    for backend in extra_backends {
        router.add_server(backend.clone());
    }

    tracing::info!(
        strategy = %config.strategy,
        backends = router.len(),
        "Router ready"
    );

    let pool = WorkerPool::new(
        "balancer",
        config.listener.workers,
        config.listener.queue_capacity,
        config.listener.overload,
    )?;
    let listener = Listener::bind(
        &config.listener.bind_address,
        pool,
        HandlerMode::forward(Arc::clone(&router)),
    )
    .await?;
    let local_addr = listener.local_addr();
    let handle = tokio::spawn(listener.run(shutdown.subscribe()));

    Ok(Balancer {
        local_addr,
        router,
        handle,
    })
}
