//! MockTransport - in-memory transport for driving the session in tests
//!
//! The session owns the `MockTransport`; the test keeps the `MockPeer` and
//! plays the collector: inject server bytes, observe frames, cut the link.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{NodeError, Transport, TransportKind};
use tokio::sync::mpsc;

#[derive(Debug)]
enum Inbound {
    Data(Bytes),
    Disconnect,
}

#[derive(Debug, Default)]
struct MockState {
    refuse_connect: AtomicBool,
    fail_sends: AtomicBool,
    connects: AtomicU64,
}

/// Node side
pub struct MockTransport {
    kind: TransportKind,
    connected: bool,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::UnboundedSender<Bytes>,
    state: Arc<MockState>,
}

/// Collector side
pub struct MockPeer {
    inbound: mpsc::UnboundedSender<Inbound>,
    outbound: mpsc::UnboundedReceiver<Bytes>,
    state: Arc<MockState>,
}

/// Create a connected transport/peer pair
pub fn mock_link(kind: TransportKind) -> (MockTransport, MockPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let state = Arc::new(MockState::default());
    (
        MockTransport {
            kind,
            connected: false,
            inbound: inbound_rx,
            outbound: outbound_tx,
            state: Arc::clone(&state),
        },
        MockPeer {
            inbound: inbound_tx,
            outbound: outbound_rx,
            state,
        },
    )
}

impl MockTransport {
    fn disconnected(&self, message: &str) -> NodeError {
        NodeError::disconnected("mock", message)
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), NodeError> {
        if self.state.refuse_connect.load(Ordering::SeqCst) {
            return Err(self.disconnected("connection refused"));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), NodeError> {
        if !self.connected {
            return Err(self.disconnected("not connected"));
        }
        if self.state.fail_sends.load(Ordering::SeqCst) {
            self.connected = false;
            return Err(self.disconnected("send failed"));
        }
        self.outbound
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| self.disconnected("peer dropped"))
    }

    async fn receive(&mut self) -> Result<Bytes, NodeError> {
        if !self.connected {
            return Err(self.disconnected("not connected"));
        }
        match self.inbound.recv().await {
            Some(Inbound::Data(bytes)) => Ok(bytes),
            Some(Inbound::Disconnect) => {
                self.connected = false;
                Err(self.disconnected("link cut"))
            }
            None => {
                self.connected = false;
                Err(self.disconnected("peer dropped"))
            }
        }
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

impl MockPeer {
    /// Deliver bytes to the node
    pub fn send(&self, bytes: impl Into<Bytes>) {
        let _ = self.inbound.send(Inbound::Data(bytes.into()));
    }

    /// Make the node's next receive fail
    pub fn disconnect(&self) {
        let _ = self.inbound.send(Inbound::Disconnect);
    }

    pub fn set_refuse_connect(&self, refuse: bool) {
        self.state.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.state.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Successful connects so far
    pub fn connect_count(&self) -> u64 {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Next frame the node sent, waiting for it
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.outbound.recv().await
    }

    /// Next frame the node sent, if any
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.outbound.try_recv().ok()
    }

    /// Every frame sent so far
    pub fn drain(&mut self) -> Vec<Bytes> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
