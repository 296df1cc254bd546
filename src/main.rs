use std::path::PathBuf;

use clap::Parser;

use tcp_balancer::config::{self, BalancerConfig, ConfigError};
use tcp_balancer::lifecycle::{self, Shutdown};
use tcp_balancer::observability;
use tcp_balancer::StrategyKind;

#[derive(Parser)]
#[command(name = "tcp-balancer")]
#[command(about = "TCP reverse proxy with pluggable routing strategies", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Balancer bind address (overrides the file).
    #[arg(short, long)]
    bind: Option<String>,

    /// Routing strategy (overrides the file).
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Balancer worker count (overrides the file).
    #[arg(short, long)]
    workers: Option<usize>,

    /// Number of in-process echo backends (overrides the file).
    #[arg(long)]
    local_backends: Option<u16>,
}

impl Cli {
    fn apply(&self, config: &mut BalancerConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(workers) = self.workers {
            config.listener.workers = workers;
        }
        if let Some(count) = self.local_backends {
            config.local_backends.count = count;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => BalancerConfig::default(),
    };
    cli.apply(&mut config);
    config::validate_config(&config).map_err(ConfigError::Validation)?;

    observability::init_logging(
        &config.observability.log_filter,
        config.observability.log_format,
    );
    tracing::info!("tcp-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            observability::metrics::init_metrics(addr);
        }
    }

    let shutdown = Shutdown::new();
    let local = lifecycle::spawn_local_backends(&config.local_backends, &shutdown).await?;
    let balancer = lifecycle::start_balancer(&config, &local, &shutdown).await?;

    tracing::info!(
        address = %balancer.local_addr,
        strategy = %config.strategy,
        backends = balancer.router.len(),
        "Balancer accepting connections"
    );

    let mut accept_loop = balancer.handle;
    tokio::select! {
        result = &mut accept_loop => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Balancer listener failed"),
                Err(e) => tracing::error!(error = %e, "Balancer listener task aborted"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C");
        }
    }

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}
