//! TcpTransport - 到采集端的面向连接字节流

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use contracts::{NodeError, Transport, TransportKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

const READ_CHUNK: usize = 1024;

/// Upper bound on one connect attempt, an unreachable host otherwise waits out the SYN retries
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Stream transport
pub struct TcpTransport {
    name: String,
    addr: String,
    stream: Option<TcpStream>,
    read_buf: BytesMut,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// `addr` is `host:port`, resolved on every connect
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        Self {
            name: format!("tcp://{addr}"),
            addr,
            stream: None,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn stream(&mut self) -> Result<&mut TcpStream, NodeError> {
        let name = &self.name;
        self.stream
            .as_mut()
            .ok_or_else(|| NodeError::disconnected(name.as_str(), "not connected"))
    }

    fn fail(&mut self, err: std::io::Error) -> NodeError {
        self.stream = None;
        NodeError::disconnected(self.name.as_str(), err.to_string())
    }
}

impl Transport for TcpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    #[instrument(name = "tcp_connect", skip(self), fields(addr = %self.addr))]
    async fn connect(&mut self) -> Result<(), NodeError> {
        let attempt = TcpStream::connect(self.addr.as_str());
        let stream = tokio::time::timeout(self.connect_timeout, attempt)
            .await
            .map_err(|_| NodeError::disconnected(self.name.as_str(), "connect timed out"))?
            .map_err(|e| NodeError::disconnected(self.name.as_str(), e.to_string()))?;
        stream.set_nodelay(true)?;
        self.read_buf.clear();
        self.stream = Some(stream);
        debug!(addr = %self.addr, "connected");
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), NodeError> {
        let result = self.stream()?.write_all(frame).await;
        result.map_err(|e| self.fail(e))
    }

    async fn receive(&mut self) -> Result<Bytes, NodeError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| NodeError::disconnected(self.name.as_str(), "not connected"))?;
        self.read_buf.reserve(READ_CHUNK);
        match stream.read_buf(&mut self.read_buf).await {
            Ok(0) => {
                self.stream = None;
                Err(NodeError::disconnected(
                    self.name.as_str(),
                    "connection closed by peer",
                ))
            }
            Ok(_) => Ok(self.read_buf.split().freeze()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!(addr = %self.addr, "closed");
        }
    }
}
