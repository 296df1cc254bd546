//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use tcp_balancer::config::BalancerConfig;
use tcp_balancer::lifecycle::{self, Balancer, Shutdown};
use tcp_balancer::{BackendAddress, StrategyKind};

/// A mock backend that records every request head it receives.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn address(&self) -> BackendAddress {
        self.addr.to_string().parse().unwrap()
    }

    /// Request heads received so far, verbatim.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Hooks for a backend that holds its response until released.
#[derive(Default)]
pub struct Gate {
    /// Notified once the request head has been read.
    pub received: Notify,
    /// Backend waits on this before responding.
    pub release: Notify,
}

/// Start a mock backend on an ephemeral port that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> MockBackend {
    start_backend(response, None).await
}

/// Like [`start_mock_backend`], but every response waits on `gate.release`.
pub async fn start_gated_backend(response: &'static str, gate: Arc<Gate>) -> MockBackend {
    start_backend(response, Some(gate)).await
}

async fn start_backend(response: &'static str, gate: Option<Arc<Gate>>) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let recorded = Arc::clone(&recorded);
            let gate = gate.clone();
            tokio::spawn(async move {
                let (reader, mut writer) = socket.split();
                let mut reader = BufReader::new(reader);

                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    head.push_str(&line);
                    if line == "\r\n" || line == "\n" {
                        break;
                    }
                }
                recorded.lock().unwrap().push(head);

                if let Some(gate) = gate {
                    gate.received.notify_one();
                    gate.release.notified().await;
                }

                let _ = writer.write_all(response.as_bytes()).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    MockBackend { addr, requests }
}

/// Start a balancer on an ephemeral port routing to `backends`.
pub async fn start_balancer(
    strategy: StrategyKind,
    backends: &[BackendAddress],
    shutdown: &Shutdown,
) -> Balancer {
    start_balancer_with(strategy, backends, 4, 1024, shutdown).await
}

/// Like [`start_balancer`] with an explicit pool size.
pub async fn start_balancer_with(
    strategy: StrategyKind,
    backends: &[BackendAddress],
    workers: usize,
    queue_capacity: usize,
    shutdown: &Shutdown,
) -> Balancer {
    let mut config = BalancerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.workers = workers;
    config.listener.queue_capacity = queue_capacity;
    config.strategy = strategy;
    config.local_backends.count = 0;

    lifecycle::start_balancer(&config, backends, shutdown)
        .await
        .unwrap()
}

/// Send `request` and read until the server closes.
pub async fn send_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .expect("response within 5s");
    match read {
        Ok(_) => response,
        // Closing with unread request bytes may reset instead of FIN.
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => response,
        Err(e) => panic!("reading response failed: {e}"),
    }
}

/// An address nothing is listening on.
pub async fn unused_address() -> BackendAddress {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string().parse().unwrap()
}
