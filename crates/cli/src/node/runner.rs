//! Node runner - 根据 `NodeConfig` 构建两个执行上下文，
//! 并监管它们直到退出。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use acquisition::{build_source, outbound_queue, QueueProbe, SamplingThread, Scheduler};
use anyhow::{Context, Result};
use contracts::{
    ClockConfig, ClockMode, ClockOffsetSource, FixedClockOffset, LinkStatus, NodeConfig,
    SystemClockOffset, Transport, TransportKind, Uptime,
};
use observability::{NodeStatsAggregator, NodeSummary};
use session::{
    Session, SessionBuilder, SessionConfig, SessionMetrics, TcpTransport, UdpTransport,
    DEFAULT_CONNECT_TIMEOUT,
};
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Runner settings
#[derive(Debug, Clone)]
pub struct NodeOptions {
    /// Validated node configuration
    pub config: NodeConfig,

    /// Stop after this long (None = until shutdown)
    pub duration: Option<Duration>,

    /// Period of metrics publication
    pub stats_interval: Duration,
}

/// Runs one node to completion
pub struct NodeRunner {
    options: NodeOptions,
}

/// What the supervisor watches besides the session task
struct Probes {
    link: Arc<LinkStatus>,
    queue: QueueProbe,
    session: Arc<SessionMetrics>,
}

impl NodeRunner {
    pub fn new(options: NodeOptions) -> Self {
        Self { options }
    }

    /// Run until `shutdown` resolves, the duration elapses or the session ends
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<NodeSummary> {
        let config = &self.options.config;
        let uptime = Uptime::start();
        let clock_offset_ms = clock_source(&config.clock).offset_ms(&uptime);
        let kind = config.server.transport;
        let link = Arc::new(LinkStatus::new());

        let (producer, consumer) = outbound_queue(config.queue_capacity());
        let queue = producer.probe();
        let mut scheduler =
            Scheduler::new(producer, Arc::clone(&link), kind.max_samples_per_message());
        for channel in &config.channels {
            scheduler
                .add_channel(build_source(&channel.source, uptime))
                .with_context(|| format!("Failed to add channel '{}'", channel.name))?;
        }

        let builder = SessionBuilder::new(consumer, Arc::clone(&link))
            .params(scheduler.params())
            .name(config.node.name.clone())
            .clock_offset_ms(clock_offset_ms)
            .config(SessionConfig::from(config));

        let addr = collector_addr(&config.server.address, config.server.port);
        info!(
            node = %config.node.name,
            collector = %addr,
            transport = %kind,
            channels = config.channel_count(),
            clock_offset_ms,
            "Starting node"
        );

        match kind {
            TransportKind::Tcp => {
                let connect_timeout = Duration::from_millis(config.server.reconnect_interval_ms)
                    .max(DEFAULT_CONNECT_TIMEOUT);
                let transport = TcpTransport::new(addr).with_connect_timeout(connect_timeout);
                let session = builder.build(transport)?;
                self.supervise(session, scheduler, uptime, link, queue, shutdown)
                    .await
            }
            TransportKind::Udp => {
                let session = builder.build(UdpTransport::new(addr))?;
                self.supervise(session, scheduler, uptime, link, queue, shutdown)
                    .await
            }
        }
    }

    async fn supervise<T>(
        &self,
        session: Session<T>,
        scheduler: Scheduler,
        uptime: Uptime,
        link: Arc<LinkStatus>,
        queue: QueueProbe,
        shutdown: impl Future<Output = ()>,
    ) -> Result<NodeSummary>
    where
        T: Transport + 'static,
    {
        let started = Instant::now();
        let tick_interval = Duration::from_micros(self.options.config.sampling.tick_interval_us);
        let probes = Probes {
            link,
            queue,
            session: session.metrics(),
        };

        let sampling = SamplingThread::spawn(scheduler, uptime, tick_interval)
            .map_err(CliError::from)
            .context("Failed to spawn sampling thread")?;
        let mut handle = session.spawn();

        let mut aggregator = NodeStatsAggregator::new();
        let mut ticker = tokio::time::interval(self.options.stats_interval);
        let deadline = async {
            match self.options.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        let finished = loop {
            tokio::select! {
                joined = &mut handle => break Some(joined),
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping node...");
                    break None;
                }
                _ = &mut deadline => {
                    info!("Run duration elapsed, stopping node...");
                    break None;
                }
                _ = ticker.tick() => {
                    publish(&mut aggregator, &probes, &sampling);
                }
            }
        };

        // Dropping the session closes the queue, which releases the sampling thread
        let joined = match finished {
            Some(joined) => joined,
            None => {
                handle.abort();
                handle.await
            }
        };

        publish(&mut aggregator, &probes, &sampling);
        let acquisition = tokio::task::spawn_blocking(move || sampling.stop())
            .await
            .context("Failed to join sampling thread")?;
        observability::record_acquisition(&acquisition);

        let summary =
            aggregator.summary(started.elapsed(), acquisition, probes.session.snapshot());

        match joined {
            Ok(Ok(())) => {
                warn!("Session stopped on its own");
                Ok(summary)
            }
            Ok(Err(e)) => Err(CliError::from(e).into()),
            Err(e) if e.is_cancelled() => Ok(summary),
            Err(e) => Err(CliError::startup(format!("session task panicked: {e}")).into()),
        }
    }
}

fn publish(aggregator: &mut NodeStatsAggregator, probes: &Probes, sampling: &SamplingThread) {
    let depth = probes.queue.len();
    let initialized = probes.link.is_initialized();
    aggregator.observe(depth, initialized);

    let acquisition = sampling.metrics().snapshot();
    let session = probes.session.snapshot();
    observability::record_queue_depth(depth);
    observability::record_link_state(initialized, probes.link.epoch());
    observability::record_acquisition(&acquisition);
    observability::record_session(&session);

    debug!(
        queue_depth = depth,
        initialized,
        samples_taken = acquisition.samples_taken,
        samples_sent = session.samples_sent,
        reconnects = session.reconnects,
        "Node stats"
    );
}

/// One-time clock offset provider for the configured mode
fn clock_source(config: &ClockConfig) -> Box<dyn ClockOffsetSource> {
    match config.mode {
        ClockMode::System => Box::new(SystemClockOffset),
        ClockMode::Fixed => Box::new(FixedClockOffset(config.fixed_offset_ms)),
    }
}

/// `host:port`, bracketing bare IPv6 literals
pub fn collector_addr(address: &str, port: u16) -> String {
    if address.contains(':') && !address.starts_with('[') {
        format!("[{address}]:{port}")
    } else {
        format!("{address}:{port}")
    }
}
