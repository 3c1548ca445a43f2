//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ClockMode, NodeConfig, SourceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;
use crate::node::collector_addr;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    node: String,
    server: ServerInfo,
    sampling: SamplingInfo,
    clock: String,
    channels: Vec<ChannelInfo>,
}

#[derive(Serialize)]
struct ServerInfo {
    collector: String,
    transport: String,
    reconnect_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    info_retry_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keepalive_threshold_ms: Option<u64>,
    max_samples_per_message: u8,
}

#[derive(Serialize)]
struct SamplingInfo {
    tick_interval_us: u64,
    queue_capacity: usize,
}

#[derive(Serialize)]
struct ChannelInfo {
    id: usize,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");
    ensure_config_exists(&args.config)?;

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args.channels);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args.channels);
    }

    Ok(())
}

fn build_config_info(config: &NodeConfig, with_sources: bool) -> ConfigInfo {
    let kind = config.server.transport;
    let datagram = kind.is_datagram();

    ConfigInfo {
        version: format!("{:?}", config.version),
        node: config.node.name.clone(),
        server: ServerInfo {
            collector: collector_addr(&config.server.address, config.server.port),
            transport: kind.to_string(),
            reconnect_interval_ms: config.server.reconnect_interval_ms,
            info_retry_ms: datagram.then_some(config.server.info_retry_ms),
            keepalive_threshold_ms: datagram.then_some(config.keepalive.threshold_ms),
            max_samples_per_message: kind.max_samples_per_message(),
        },
        sampling: SamplingInfo {
            tick_interval_us: config.sampling.tick_interval_us,
            queue_capacity: config.queue_capacity(),
        },
        clock: describe_clock(config),
        channels: config
            .channels
            .iter()
            .enumerate()
            .map(|(id, channel)| ChannelInfo {
                id,
                name: channel.name.clone(),
                source: with_sources.then(|| describe_source(&channel.source)),
            })
            .collect(),
    }
}

fn describe_clock(config: &NodeConfig) -> String {
    match config.clock.mode {
        ClockMode::System => "system".to_string(),
        ClockMode::Fixed => format!("fixed ({} ms)", config.clock.fixed_offset_ms),
    }
}

fn describe_source(source: &SourceConfig) -> String {
    match *source {
        SourceConfig::Constant { value } => format!("constant {value}"),
        SourceConfig::Ramp { start, step } => format!("ramp from {start} by {step}"),
        SourceConfig::Sine {
            amplitude,
            period_ms,
            offset,
        } => format!("sine {offset} ± {amplitude} every {period_ms} ms"),
        SourceConfig::Noise { min, max } => format!("noise in [{min}, {max})"),
        SourceConfig::Uptime => "uptime".to_string(),
    }
}

fn print_config_info(config: &NodeConfig, with_sources: bool) {
    let info = build_config_info(config, with_sources);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Sensor Node Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📟 Node");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Name: {}", info.node);
    println!("   └─ Clock offset: {}", info.clock);

    println!("\n🌐 Collector");
    println!("   ├─ Address: {}", info.server.collector);
    println!("   ├─ Transport: {}", info.server.transport);
    println!(
        "   ├─ Reconnect interval: {} ms",
        info.server.reconnect_interval_ms
    );
    if let Some(retry) = info.server.info_retry_ms {
        println!("   ├─ Info retry: {} ms", retry);
    }
    if let Some(threshold) = info.server.keepalive_threshold_ms {
        println!("   ├─ KeepAlive threshold: {} ms", threshold);
    }
    println!(
        "   └─ Samples per message: {}",
        info.server.max_samples_per_message
    );

    println!("\n⚙️  Sampling");
    println!("   ├─ Tick interval: {} µs", info.sampling.tick_interval_us);
    println!("   └─ Queue capacity: {}", info.sampling.queue_capacity);

    println!("\n📈 Channels ({})", info.channels.len());
    for (i, channel) in info.channels.iter().enumerate() {
        let prefix = if i == info.channels.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        match channel.source {
            Some(ref source) => {
                println!("   {} [{}] {} ({})", prefix, channel.id, channel.name, source)
            }
            None => println!("   {} [{}] {}", prefix, channel.id, channel.name),
        }
    }

    println!();
}
