//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (workers, queue, port ranges)
//! - Check every address parses before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BalancerConfig;
use crate::load_balancer::{AddressError, BackendAddress};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.workers must be at least 1")]
    NoWorkers,
    #[error("listener.queue_capacity must be at least 1")]
    NoQueueCapacity,
    #[error("local_backends.workers must be at least 1")]
    NoLocalWorkers,
    #[error("backends[{index}]: {source}")]
    BackendAddress {
        index: usize,
        #[source]
        source: AddressError,
    },
    #[error("local_backends: {count} ports from {base_port} exceed 65535")]
    LocalPortRange { base_port: u16, count: u16 },
    #[error("no backends configured and local_backends.count is 0")]
    NoBackends,
    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.workers == 0 {
        errors.push(ValidationError::NoWorkers);
    }
    if config.listener.queue_capacity == 0 {
        errors.push(ValidationError::NoQueueCapacity);
    }

    for (index, backend) in config.backends.iter().enumerate() {
        if let Err(source) = backend.address.parse::<BackendAddress>() {
            errors.push(ValidationError::BackendAddress { index, source });
        }
    }

    let local = &config.local_backends;
    if local.count > 0 {
        if local.workers == 0 {
            errors.push(ValidationError::NoLocalWorkers);
        }
        if u32::from(local.base_port) + u32::from(local.count) - 1 > u32::from(u16::MAX) {
            errors.push(ValidationError::LocalPortRange {
                base_port: local.base_port,
                count: local.count,
            });
        }
    } else if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&BalancerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = BalancerConfig::default();
        config.listener.workers = 0;
        config.listener.queue_capacity = 0;
        config.backends.push(BackendConfig {
            address: "no-port".into(),
        });
        config.local_backends.base_port = 65_530;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.contains(&ValidationError::NoWorkers));
        assert!(errors.contains(&ValidationError::NoQueueCapacity));
        assert!(errors.contains(&ValidationError::LocalPortRange {
            base_port: 65_530,
            count: 10
        }));
        assert!(matches!(
            errors[2],
            ValidationError::BackendAddress { index: 0, .. }
        ));
    }

    #[test]
    fn requires_some_backend() {
        let mut config = BalancerConfig::default();
        config.local_backends.count = 0;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoBackends]));

        config.backends.push(BackendConfig {
            address: "127.0.0.1:3000".into(),
        });
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn last_local_port_may_be_65535() {
        let mut config = BalancerConfig::default();
        config.local_backends.base_port = 65_526;
        config.local_backends.count = 10;
        assert_eq!(validate_config(&config), Ok(()));
    }
}
