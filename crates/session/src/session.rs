//! Session - 基于单个 Transport 的协议状态机
//!
//! `DISCONNECTED → CONNECTING → AWAITING_PARAMS → ACTIVE`；任何传输失败
//! 都在完整重置 epoch 后回到 `DISCONNECTED`。

use std::sync::Arc;
use std::time::Duration;

use acquisition::OutboundConsumer;
use contracts::{
    wire, ChannelParams, LinkStatus, NodeConfig, NodeError, OutboundMessage, SharedParams,
    Transport,
};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, instrument, trace, warn};

use crate::codec::{Codec, NodeInfo, ServerDecoder, ServerFrame};
use crate::error::SessionError;
use crate::keepalive::KeepAlivePolicy;
use crate::metrics::SessionMetrics;
use crate::state::SessionState;

/// Session timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pause after a failed connect attempt, and before reconnecting after a
    /// transport failure
    pub reconnect_interval: Duration,
    /// Datagram only: Info resend period while awaiting parameters
    pub info_retry: Duration,
    /// Datagram only: idle time before a KeepAlive, and the enable threshold
    pub keepalive_threshold_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(500),
            info_retry: Duration::from_millis(5_000),
            keepalive_threshold_ms: 15_000,
        }
    }
}

impl From<&NodeConfig> for SessionConfig {
    fn from(config: &NodeConfig) -> Self {
        Self {
            reconnect_interval: Duration::from_millis(config.server.reconnect_interval_ms),
            info_retry: Duration::from_millis(config.server.info_retry_ms),
            keepalive_threshold_ms: config.keepalive.threshold_ms,
        }
    }
}

/// Builder for creating a Session
pub struct SessionBuilder {
    consumer: OutboundConsumer,
    link: Arc<LinkStatus>,
    params: Vec<Arc<SharedParams>>,
    name: String,
    clock_offset_ms: u64,
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new(consumer: OutboundConsumer, link: Arc<LinkStatus>) -> Self {
        Self {
            consumer,
            link,
            params: Vec::new(),
            name: String::new(),
            clock_offset_ms: 0,
            config: SessionConfig::default(),
        }
    }

    /// Parameter handles in channel-id order
    pub fn params(mut self, params: Vec<Arc<SharedParams>>) -> Self {
        self.params = params;
        self
    }

    /// Device name announced in the Info frame
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn clock_offset_ms(mut self, offset: u64) -> Self {
        self.clock_offset_ms = offset;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the identity and bind the transport
    pub fn build<T: Transport>(self, transport: T) -> Result<Session<T>, SessionError> {
        if self.params.is_empty() || self.params.len() > usize::from(u8::MAX) {
            return Err(NodeError::config_validation(
                "channels",
                format!("channel count must be 1..=255, got {}", self.params.len()),
            )
            .into());
        }
        if self.name.is_empty() || self.name.len() > usize::from(u8::MAX) {
            return Err(
                NodeError::config_validation("node.name", "name must be 1..=255 bytes").into(),
            );
        }
        if self.name.as_bytes().contains(&wire::NAME_TERMINATOR) {
            return Err(NodeError::config_validation(
                "node.name",
                "name must not contain the ETX byte",
            )
            .into());
        }

        let kind = transport.kind();
        let channel_count = self.params.len() as u8;
        let now = Instant::now();
        Ok(Session {
            transport,
            consumer: self.consumer,
            negotiated: vec![false; self.params.len()],
            params: self.params,
            link: self.link,
            info: NodeInfo {
                name: self.name,
                channel_count,
                clock_offset_ms: self.clock_offset_ms,
            },
            codec: Codec::new(kind),
            decoder: ServerDecoder::new(kind, channel_count),
            keepalive: KeepAlivePolicy::new(self.config.keepalive_threshold_ms),
            config: self.config,
            state: SessionState::Disconnected,
            last_send: now,
            last_info: now,
            retry_at: None,
            metrics: Arc::new(SessionMetrics::new()),
        })
    }
}

/// 持有 transport，驱动握手与数据发送
pub struct Session<T: Transport> {
    transport: T,
    consumer: OutboundConsumer,
    params: Vec<Arc<SharedParams>>,
    link: Arc<LinkStatus>,
    info: NodeInfo,
    codec: Codec,
    decoder: ServerDecoder,
    config: SessionConfig,
    state: SessionState,
    /// Channels negotiated in the current epoch
    negotiated: Vec<bool>,
    keepalive: KeepAlivePolicy,
    last_send: Instant,
    last_info: Instant,
    /// Earliest reconnect after a failure
    retry_at: Option<Instant>,
    metrics: Arc<SessionMetrics>,
}

impl<T: Transport> Session<T> {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.link.is_initialized()
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn keepalive(&self) -> &KeepAlivePolicy {
        &self.keepalive
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn metrics(&self) -> Arc<SessionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Loop `step` until the outbound queue closes
    #[instrument(name = "session_run", skip(self), fields(transport = %self.transport.name()))]
    pub async fn run(mut self) -> Result<(), SessionError> {
        info!(
            channels = self.info.channel_count,
            kind = %self.codec.kind(),
            "session started"
        );
        loop {
            match self.step().await {
                Ok(_) => {}
                Err(SessionError::QueueClosed) => break,
                Err(e) => return Err(e),
            }
        }
        self.transport.close().await;
        self.link.set_initialized(false);
        info!("outbound queue closed, session stopped");
        Ok(())
    }

    /// Spawn the session as a background task
    pub fn spawn(self) -> JoinHandle<Result<(), SessionError>>
    where
        T: 'static,
    {
        tokio::spawn(self.run())
    }

    /// One transition, or one iteration while ACTIVE
    ///
    /// # Errors
    /// `QueueClosed` once there is nothing left to stream. Transport failures
    /// are handled internally.
    pub async fn step(&mut self) -> Result<SessionState, SessionError> {
        match self.state {
            SessionState::Disconnected => self.open().await?,
            SessionState::Connecting => self.announce().await,
            SessionState::AwaitingParams => self.negotiate().await,
            SessionState::Active => self.stream().await?,
        }
        Ok(self.state)
    }

    async fn open(&mut self) -> Result<(), SessionError> {
        if self.consumer.is_closed() {
            return Err(SessionError::QueueClosed);
        }
        if let Some(retry_at) = self.retry_at.take() {
            sleep_until(retry_at).await;
        }
        match self.transport.connect().await {
            Ok(()) => {
                info!(transport = %self.transport.name(), "transport open");
                self.transition(SessionState::Connecting);
            }
            Err(e) => {
                debug!(error = %e, "connect failed, retrying");
                sleep(self.config.reconnect_interval).await;
            }
        }
        Ok(())
    }

    async fn announce(&mut self) {
        self.negotiated.fill(false);
        self.decoder.reset();
        match self.send_info().await {
            Ok(()) => self.transition(SessionState::AwaitingParams),
            Err(e) => self.handle_failure(e).await,
        }
    }

    async fn negotiate(&mut self) {
        let retry_at = self.last_info + self.config.info_retry;
        let datagram = self.codec.kind().is_datagram();

        let received = tokio::select! {
            chunk = self.transport.receive() => Some(chunk),
            _ = sleep_until(retry_at), if datagram => None,
        };

        let result = match received {
            None => {
                debug!("no parameters yet, resending Info");
                self.send_info().await
            }
            Some(Ok(chunk)) => self.handle_inbound(&chunk).await,
            Some(Err(e)) => Err(e),
        };
        if let Err(e) = result {
            self.handle_failure(e).await;
            return;
        }

        if self.negotiated.iter().all(|&done| done) {
            self.link.set_initialized(true);
            self.metrics.inc_negotiations();
            info!(
                epoch = self.link.epoch(),
                keepalive = datagram && self.keepalive.is_enabled(),
                "all channels negotiated"
            );
            self.transition(SessionState::Active);
        }
    }

    async fn stream(&mut self) -> Result<(), SessionError> {
        let keepalive_at = self.last_send + self.keepalive.threshold();
        let keepalive_on = self.codec.kind().is_datagram() && self.keepalive.is_enabled();

        let result = tokio::select! {
            message = self.consumer.recv() => {
                let message = message?;
                self.send_samples(message).await
            }
            chunk = self.transport.receive() => match chunk {
                Ok(chunk) => self.handle_inbound(&chunk).await,
                Err(e) => Err(e),
            },
            _ = sleep_until(keepalive_at), if keepalive_on => self.send_keep_alive().await,
        };

        if let Err(e) = result {
            self.handle_failure(e).await;
        }
        Ok(())
    }

    /// Dispatch every frame in an inbound chunk
    ///
    /// Only transport errors are returned; malformed frames are counted and ignored.
    async fn handle_inbound(&mut self, chunk: &[u8]) -> Result<(), NodeError> {
        for frame in self.decoder.decode(chunk) {
            match frame {
                Ok(ServerFrame::RequestInfo) => {
                    debug!(state = %self.state, "Info requested");
                    self.send_info().await?;
                }
                Ok(ServerFrame::SetParameters { channel_id, params }) => {
                    self.apply_parameters(channel_id, params).await?;
                }
                Err(e) => {
                    self.metrics.inc_malformed();
                    debug!(error = %e, "ignoring malformed frame");
                }
            }
        }
        Ok(())
    }

    async fn apply_parameters(
        &mut self,
        channel_id: u8,
        requested: ChannelParams,
    ) -> Result<(), NodeError> {
        let index = usize::from(channel_id);
        let Some(shared) = self.params.get(index) else {
            self.metrics.inc_malformed();
            return Ok(());
        };

        let max = self.codec.kind().max_samples_per_message();
        let params = requested.validate(channel_id, max).unwrap_or_else(|e| {
            warn!(error = %e, "clamping batch size");
            requested.clamped(max)
        });
        shared.set(params);
        self.negotiated[index] = true;
        info!(
            channel_id,
            period_ms = params.sampling_period_ms,
            batch_size = params.batch_size,
            "parameters applied"
        );

        if self.state == SessionState::Active {
            // partial buffers restart under the new cadence, queued batches stay
            let generation = self.link.advance_generation();
            debug!(channel_id, generation, "renegotiated while active");
        }

        if let Some(ack) = self.codec.ack(channel_id) {
            self.send_frame(&ack).await?;
        }

        if self.codec.kind().is_datagram() {
            let enabled = self.keepalive.recompute(self.params.iter().map(|p| p.get()));
            debug!(keepalive = enabled, "keepalive recomputed");
        }
        Ok(())
    }

    async fn send_samples(&mut self, message: OutboundMessage) -> Result<(), NodeError> {
        if message.epoch != self.link.epoch() {
            self.metrics.add_stale(1);
            trace!(
                channel_id = message.channel_id,
                epoch = message.epoch,
                "discarding batch from previous epoch"
            );
            return Ok(());
        }
        let frame = self.codec.samples(&message);
        self.send_frame(&frame).await?;
        self.metrics.record_samples(message.sample_count);
        trace!(
            channel_id = message.channel_id,
            samples = message.sample_count,
            bytes = frame.len(),
            "samples sent"
        );
        Ok(())
    }

    async fn send_keep_alive(&mut self) -> Result<(), NodeError> {
        if let Some(frame) = self.codec.keep_alive() {
            self.send_frame(&frame).await?;
            self.metrics.inc_keepalives();
            trace!("keepalive sent");
        }
        Ok(())
    }

    async fn send_info(&mut self) -> Result<(), NodeError> {
        let frame = self.codec.info(&self.info);
        self.send_frame(&frame).await?;
        self.last_info = Instant::now();
        debug!(bytes = frame.len(), "Info sent");
        Ok(())
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), NodeError> {
        self.transport.send(frame).await?;
        self.metrics.record_sent(frame.len());
        self.last_send = Instant::now();
        Ok(())
    }

    /// 完整重置：参数失效，epoch 推进，队列清空
    #[instrument(name = "session_handle_failure", skip(self, error), fields(state = %self.state))]
    async fn handle_failure(&mut self, error: NodeError) {
        if self.state.is_handshaking_or_active() {
            warn!(error = %error, "transport failure, resetting session");
        } else {
            debug!(error = %error, "transport failure before handshake");
        }
        self.transport.close().await;

        self.link.set_initialized(false);
        let epoch = self.link.advance_epoch();
        let discarded = self.consumer.drain();
        self.metrics.add_stale(discarded);
        self.metrics.inc_reconnects();

        self.negotiated.fill(false);
        self.decoder.reset();
        self.keepalive = KeepAlivePolicy::new(self.config.keepalive_threshold_ms);
        self.retry_at = Some(Instant::now() + self.config.reconnect_interval);
        debug!(epoch, discarded, "session reset");
        self.transition(SessionState::Disconnected);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "state transition");
            self.state = next;
        }
    }
}
