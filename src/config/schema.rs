//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML, and every
//! field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::load_balancer::StrategyKind;
use crate::observability::LogFormat;
use crate::worker::OverloadPolicy;

/// Root configuration for the balancer process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Balancer listener and its worker pool.
    pub listener: ListenerConfig,

    /// Routing strategy used by the balancer.
    pub strategy: StrategyKind,

    /// Externally running backends to register.
    pub backends: Vec<BackendConfig>,

    /// Echo backends started in-process.
    pub local_backends: LocalBackendsConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8003").
    pub bind_address: String,

    /// Number of workers handling connections.
    pub workers: usize,

    /// Maximum queued connections awaiting a worker.
    pub queue_capacity: usize,

    /// Behaviour when the queue is full.
    pub overload: OverloadPolicy,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8003".to_string(),
            workers: 10,
            queue_capacity: 1024,
            overload: OverloadPolicy::Block,
        }
    }
}

/// A backend reachable over the network.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: String,
}

/// Echo backends started alongside the balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalBackendsConfig {
    /// How many to start; 0 disables them.
    pub count: u16,

    /// Host they bind to and are registered under.
    pub host: String,

    /// Port of the first one; the rest follow consecutively.
    pub base_port: u16,

    /// Workers per local backend.
    pub workers: usize,
}

impl Default for LocalBackendsConfig {
    fn default() -> Self {
        Self {
            count: 10,
            host: "127.0.0.1".to_string(),
            base_port: 8004,
            workers: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log_filter: String,

    pub log_format: LogFormat,

    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "tcp_balancer=info".to_string(),
            log_format: LogFormat::Full,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: BalancerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8003");
        assert_eq!(config.listener.workers, 10);
        assert_eq!(config.listener.overload, OverloadPolicy::Block);
        assert_eq!(config.strategy, StrategyKind::DynamicWeightedRoundRobin);
        assert_eq!(config.local_backends.count, 10);
        assert!(config.backends.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let config: BalancerConfig = toml::from_str(
            r#"
            strategy = "consistent_hash"

            [listener]
            bind_address = "0.0.0.0:9000"
            workers = 4
            queue_capacity = 16
            overload = "reject"

            [[backends]]
            address = "10.0.0.1:80"

            [[backends]]
            address = "10.0.0.2:80"

            [local_backends]
            count = 0

            [observability]
            log_format = "compact"
            metrics_enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy, StrategyKind::ConsistentHash);
        assert_eq!(config.listener.workers, 4);
        assert_eq!(config.listener.overload, OverloadPolicy::Reject);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].address, "10.0.0.2:80");
        assert_eq!(config.local_backends.count, 0);
        assert_eq!(config.local_backends.base_port, 8004);
        assert_eq!(config.observability.log_format, LogFormat::Compact);
        assert!(config.observability.metrics_enabled);
    }
}
