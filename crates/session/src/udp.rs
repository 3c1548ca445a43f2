//! UdpTransport - 到采集端的无连接 datagram

use std::io;

use bytes::Bytes;
use contracts::{NodeError, Transport, TransportKind};
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, instrument};

/// Largest datagram accepted from the collector
const MAX_DATAGRAM: usize = 1500;

/// ICMP port-unreachable surfaces on a connected datagram socket as one of
/// these. The collector may come back at any time, so the socket is kept.
fn is_unreachable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

/// Datagram transport
///
/// `connect` only binds an ephemeral port and fixes the peer; the first
/// outbound frame is what the collector sees as the session start.
///
/// A refused port is not a transport failure: the error is logged and
/// counted, the socket stays open.
pub struct UdpTransport {
    name: String,
    addr: String,
    socket: Option<UdpSocket>,
    recv_buf: Box<[u8]>,
    refused: u64,
}

impl UdpTransport {
    /// `addr` is `host:port`, resolved on every connect
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        Self {
            name: format!("udp://{addr}"),
            addr,
            socket: None,
            recv_buf: vec![0u8; MAX_DATAGRAM].into_boxed_slice(),
            refused: 0,
        }
    }

    /// Port-unreachable reports absorbed since creation
    pub fn refused_count(&self) -> u64 {
        self.refused
    }

    fn disconnected(&self, message: impl Into<String>) -> NodeError {
        NodeError::disconnected(self.name.as_str(), message)
    }
}

impl Transport for UdpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    #[instrument(name = "udp_connect", skip(self), fields(addr = %self.addr))]
    async fn connect(&mut self) -> Result<(), NodeError> {
        let peer = lookup_host(self.addr.as_str())
            .await
            .map_err(|e| self.disconnected(e.to_string()))?
            .next()
            .ok_or_else(|| self.disconnected("address did not resolve"))?;
        let local = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket
            .connect(peer)
            .await
            .map_err(|e| self.disconnected(e.to_string()))?;
        debug!(addr = %self.addr, local = ?socket.local_addr().ok(), "socket ready");
        self.socket = Some(socket);
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), NodeError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(self.disconnected("not connected"));
        };
        match socket.send(frame).await {
            Ok(_) => Ok(()),
            Err(e) if is_unreachable(&e) => {
                self.refused += 1;
                debug!(addr = %self.addr, error = %e, "collector unreachable, datagram dropped");
                Ok(())
            }
            Err(e) => {
                self.socket = None;
                Err(self.disconnected(e.to_string()))
            }
        }
    }

    async fn receive(&mut self) -> Result<Bytes, NodeError> {
        loop {
            let Some(socket) = self.socket.as_ref() else {
                return Err(self.disconnected("not connected"));
            };
            match socket.recv(&mut self.recv_buf).await {
                Ok(len) => return Ok(Bytes::copy_from_slice(&self.recv_buf[..len])),
                // one report per datagram we sent, so this does not spin
                Err(e) if is_unreachable(&e) => {
                    self.refused += 1;
                    debug!(addr = %self.addr, error = %e, "collector unreachable");
                }
                Err(e) => {
                    self.socket = None;
                    return Err(self.disconnected(e.to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!(addr = %self.addr, "closed");
        }
    }
}
