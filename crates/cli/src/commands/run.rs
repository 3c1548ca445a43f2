//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::NodeConfig;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::ensure_config_exists;
use crate::node::{collector_addr, NodeOptions, NodeRunner};

/// Execute the `run` command
pub async fn run_node(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    ensure_config_exists(&args.config)?;

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        node = %config.node.name,
        collector = %collector_addr(&config.server.address, config.server.port),
        transport = %config.server.transport,
        channels = config.channel_count(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let runner = NodeRunner::new(NodeOptions {
        config,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        stats_interval: Duration::from_secs(args.stats_interval.max(1)),
    });

    let summary = runner
        .run(shutdown_signal())
        .await
        .context("Node execution failed")?;

    info!(
        samples_sent = summary.session.samples_sent,
        reconnects = summary.session.reconnects,
        duration_secs = summary.duration.as_secs_f64(),
        "Sensor node finished"
    );
    println!("\n{summary}");

    Ok(())
}

fn apply_overrides(config: &mut NodeConfig, args: &RunArgs) {
    if let Some(ref server) = args.server {
        info!(server = %server, "Overriding collector address from CLI");
        config.server.address = server.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding collector port from CLI");
        config.server.port = port;
    }
    if let Some(transport) = args.transport {
        info!(transport = ?transport, "Overriding transport from CLI");
        config.server.transport = transport.into();
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &NodeConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Node: {}", config.node.name);
    println!(
        "Collector: {} ({})",
        collector_addr(&config.server.address, config.server.port),
        config.server.transport
    );
    println!(
        "Samples per message: {}",
        config.server.transport.max_samples_per_message()
    );
    println!("Queue capacity: {}", config.queue_capacity());
    println!("\nChannels ({}):", config.channels.len());
    for (id, channel) in config.channels.iter().enumerate() {
        println!("  [{id}] {}", channel.name);
    }
    println!();
}
