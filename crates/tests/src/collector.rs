//! Loopback collectors - the server side of the node protocol, for e2e tests.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use contracts::{ChannelParams, TransportKind};
use session::codec::{decode_client_datagram, encode_server_frame};
use session::{ClientFrame, ClientStreamDecoder, NodeInfo, ServerFrame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::timeout;

/// Default wait for one frame
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(3);

/// Stream collector listening on an ephemeral loopback port
pub struct TcpCollector {
    listener: TcpListener,
}

impl TcpCollector {
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Wait for the node to connect
    pub async fn accept(&self) -> Result<TcpPeer> {
        let (stream, _) = timeout(FRAME_TIMEOUT, self.listener.accept())
            .await
            .context("no connection from node")??;
        Ok(TcpPeer {
            stream,
            decoder: ClientStreamDecoder::new(),
        })
    }
}

/// One accepted node connection
pub struct TcpPeer {
    stream: TcpStream,
    decoder: ClientStreamDecoder,
}

impl TcpPeer {
    /// Next frame from the node, reading as needed
    pub async fn next_frame(&mut self) -> Result<ClientFrame> {
        let mut buf = [0u8; 2048];
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(frame);
            }
            let n = timeout(FRAME_TIMEOUT, self.stream.read(&mut buf))
                .await
                .context("no frame from node")??;
            if n == 0 {
                bail!("node closed the connection");
            }
            self.decoder.push(&buf[..n]);
        }
    }

    pub async fn expect_info(&mut self) -> Result<NodeInfo> {
        match self.next_frame().await? {
            ClientFrame::Info(info) => Ok(info),
            other => Err(anyhow!("expected Info, got {other:?}")),
        }
    }

    /// Write every channel's parameters, in channel order
    pub async fn send_params(&mut self, params: &[ChannelParams]) -> Result<()> {
        for (id, params) in params.iter().enumerate() {
            let frame = ServerFrame::SetParameters {
                channel_id: id as u8,
                params: *params,
            };
            self.stream
                .write_all(&encode_server_frame(TransportKind::Tcp, &frame))
                .await?;
        }
        Ok(())
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }
}

/// Datagram collector bound to an ephemeral loopback port
pub struct UdpCollector {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

impl UdpCollector {
    pub async fn bind() -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        Ok(Self { socket, peer: None })
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Next datagram from the node, remembering its address
    pub async fn next_frame(&mut self) -> Result<ClientFrame> {
        self.next_frame_within(FRAME_TIMEOUT).await
    }

    pub async fn next_frame_within(&mut self, wait: Duration) -> Result<ClientFrame> {
        let mut buf = [0u8; 1500];
        let (n, from) = timeout(wait, self.socket.recv_from(&mut buf))
            .await
            .context("no datagram from node")??;
        self.peer = Some(from);
        Ok(decode_client_datagram(&buf[..n])?)
    }

    /// Skip KeepAlive and Info frames until the next SensorSamples
    pub async fn next_samples(&mut self) -> Result<(u8, Vec<contracts::Sample>)> {
        loop {
            if let ClientFrame::SensorSamples {
                channel_id,
                payload,
                ..
            } = self.next_frame().await?
            {
                return Ok((channel_id, contracts::Sample::decode_all(&payload)));
            }
        }
    }

    pub async fn expect_info(&mut self) -> Result<NodeInfo> {
        match self.next_frame().await? {
            ClientFrame::Info(info) => Ok(info),
            other => Err(anyhow!("expected Info, got {other:?}")),
        }
    }

    pub async fn send(&self, frame: &ServerFrame) -> Result<()> {
        self.send_raw(&encode_server_frame(TransportKind::Udp, frame))
            .await
    }

    pub async fn set_params(&self, channel_id: u8, params: ChannelParams) -> Result<()> {
        self.send(&ServerFrame::SetParameters { channel_id, params })
            .await
    }

    pub async fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        let peer = self.peer.context("node has not spoken yet")?;
        self.socket.send_to(bytes, peer).await?;
        Ok(())
    }
}
