//! Node harness - both execution contexts wired the way the binary wires them.

use std::sync::Arc;
use std::time::Duration;

use acquisition::{outbound_queue, MetricsSnapshot, SamplingThread, Scheduler};
use anyhow::Result;
use contracts::{LinkStatus, SampleSource, Transport, TransportKind, Uptime};
use session::{
    SessionBuilder, SessionConfig, SessionError, SessionMetrics, TcpTransport, UdpTransport,
};
use tokio::task::JoinHandle;

pub const NODE_NAME: &str = "e2e-node";
pub const CLOCK_OFFSET_MS: u64 = 1_700_000_000_000;

/// A running node
pub struct TestNode {
    pub link: Arc<LinkStatus>,
    pub session_metrics: Arc<SessionMetrics>,
    sampling: SamplingThread,
    session: JoinHandle<Result<(), SessionError>>,
}

/// Start a node on loopback `port` with one channel per source
pub fn spawn_node(
    kind: TransportKind,
    port: u16,
    sources: Vec<Box<dyn SampleSource>>,
    config: SessionConfig,
) -> Result<TestNode> {
    let addr = format!("127.0.0.1:{port}");
    match kind {
        TransportKind::Tcp => spawn_with(TcpTransport::new(addr), sources, config),
        TransportKind::Udp => spawn_with(UdpTransport::new(addr), sources, config),
    }
}

fn spawn_with<T: Transport + 'static>(
    transport: T,
    sources: Vec<Box<dyn SampleSource>>,
    config: SessionConfig,
) -> Result<TestNode> {
    let kind = transport.kind();
    let uptime = Uptime::start();
    let link = Arc::new(LinkStatus::new());
    let (producer, consumer) = outbound_queue(sources.len() * 10);

    let mut scheduler = Scheduler::new(producer, Arc::clone(&link), kind.max_samples_per_message());
    for source in sources {
        scheduler.add_channel(source)?;
    }

    let session = SessionBuilder::new(consumer, Arc::clone(&link))
        .params(scheduler.params())
        .name(NODE_NAME)
        .clock_offset_ms(CLOCK_OFFSET_MS)
        .config(config)
        .build(transport)?;
    let session_metrics = session.metrics();

    let sampling = SamplingThread::spawn(scheduler, uptime, Duration::from_millis(1))?;
    Ok(TestNode {
        link,
        session_metrics,
        sampling,
        session: session.spawn(),
    })
}

impl TestNode {
    /// Abort the session and join the sampling thread
    pub async fn shutdown(self) -> MetricsSnapshot {
        self.session.abort();
        let _ = self.session.await;
        let sampling = self.sampling;
        tokio::task::spawn_blocking(move || sampling.stop())
            .await
            .unwrap_or_default()
    }
}

/// Fast session timing for tests
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        reconnect_interval: Duration::from_millis(50),
        info_retry: Duration::from_millis(200),
        keepalive_threshold_ms: 15_000,
    }
}

/// `start, start + 1, ...`
pub fn counter() -> Box<dyn SampleSource> {
    let mut next = 0.0;
    Box::new(move || {
        let value = next;
        next += 1.0;
        value
    })
}
