//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{NodeConfig, SourceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::node::collector_addr;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    node: String,
    collector: String,
    transport: String,
    channel_count: usize,
    queue_capacity: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    node: config.node.name.clone(),
                    collector: collector_addr(&config.server.address, config.server.port),
                    transport: config.server.transport.to_string(),
                    channel_count: config.channel_count(),
                    queue_capacity: config.queue_capacity(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(config: &NodeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.server.transport.is_datagram()
        && config.server.info_retry_ms > config.keepalive.threshold_ms
    {
        warnings.push(format!(
            "server.info_retry_ms ({}) exceeds keepalive.threshold_ms ({}), the collector may drop the node while it waits for parameters",
            config.server.info_retry_ms, config.keepalive.threshold_ms
        ));
    }

    if config.server.reconnect_interval_ms == 0 {
        warnings.push("server.reconnect_interval_ms is 0, failed connects retry in a tight loop".to_string());
    }

    for channel in &config.channels {
        if let SourceConfig::Ramp { step, .. } = channel.source {
            if step == 0.0 {
                warnings.push(format!(
                    "Channel '{}' is a ramp with step 0, consider a constant source",
                    channel.name
                ));
            }
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Node: {}", summary.node);
            println!("  Collector: {} ({})", summary.collector, summary.transport);
            println!("  Channels: {}", summary.channel_count);
            println!("  Queue capacity: {}", summary.queue_capacity);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
