//! 帧编解码
//!
//! 两种分帧共用一套帧类型：
//! - stream (TCP)：Info 以 STX/ETX 界定，Parameters 为按通道顺序排列的
//!   5 字节记录，ACK 隐式，无类型字节
//! - datagram (UDP)：每帧以类型字节开头
//!
//! 两个方向都有实现，采集端可复用解码器。

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::wire::{self, client, server};
use contracts::{ChannelParams, NodeError, OutboundMessage, TransportKind, SAMPLE_SIZE};

/// Identity announced in the Info frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub channel_count: u8,
    pub clock_offset_ms: u64,
}

/// Server → node frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFrame {
    /// Resend the Info frame
    RequestInfo,
    /// Apply cadence parameters to one channel
    SetParameters {
        channel_id: u8,
        params: ChannelParams,
    },
}

/// Node → server frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Info(NodeInfo),
    KeepAlive,
    SensorSamples {
        channel_id: u8,
        sample_count: u8,
        payload: Bytes,
    },
    Ack {
        channel_id: u8,
    },
}

/// Encoder for node → server frames
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    kind: TransportKind,
}

impl Codec {
    pub fn new(kind: TransportKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn info(&self, info: &NodeInfo) -> Bytes {
        let name = info.name.as_bytes();
        let mut buf = BytesMut::with_capacity(name.len() + 3 + wire::CLOCK_OFFSET_SIZE);
        match self.kind {
            TransportKind::Tcp => {
                buf.put_u8(wire::NODE_TYPE_SENSOR);
                buf.put_slice(name);
                buf.put_u8(wire::NAME_TERMINATOR);
            }
            TransportKind::Udp => {
                buf.put_u8(client::INFO);
                buf.put_u8(name.len() as u8);
                buf.put_slice(name);
            }
        }
        buf.put_u8(info.channel_count);
        buf.put_u64_le(info.clock_offset_ms);
        buf.freeze()
    }

    /// `[type] channelId sampleCount payload`
    pub fn samples(&self, message: &OutboundMessage) -> Bytes {
        let mut buf = BytesMut::with_capacity(3 + message.payload.len());
        if self.kind.is_datagram() {
            buf.put_u8(client::SENSOR_SAMPLES);
        }
        buf.put_u8(message.channel_id);
        buf.put_u8(message.sample_count);
        buf.put_slice(&message.payload);
        buf.freeze()
    }

    /// `None` on stream framing, where the ACK is implicit
    pub fn ack(&self, channel_id: u8) -> Option<Bytes> {
        self.kind
            .is_datagram()
            .then(|| Bytes::from(vec![client::ACK, channel_id]))
    }

    /// `None` on stream framing, which relies on the transport's own liveness
    pub fn keep_alive(&self) -> Option<Bytes> {
        self.kind
            .is_datagram()
            .then(|| Bytes::from_static(&[client::KEEP_ALIVE]))
    }
}

/// Decoder for server → node frames of one connection epoch
#[derive(Debug)]
pub enum ServerDecoder {
    /// Parameters arrive in channel order and may be split across reads
    Stream {
        buf: BytesMut,
        next_channel: u8,
        channel_count: u8,
    },
    /// One frame per datagram
    Datagram { channel_count: u8 },
}

impl ServerDecoder {
    pub fn new(kind: TransportKind, channel_count: u8) -> Self {
        match kind {
            TransportKind::Tcp => Self::Stream {
                buf: BytesMut::new(),
                next_channel: 0,
                channel_count,
            },
            TransportKind::Udp => Self::Datagram { channel_count },
        }
    }

    /// Forget partial input, start over at channel 0
    pub fn reset(&mut self) {
        if let Self::Stream {
            buf, next_channel, ..
        } = self
        {
            buf.clear();
            *next_channel = 0;
        }
    }

    /// Decode every complete frame in `chunk`
    ///
    /// Malformed frames are reported individually; the decoder stays usable.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Result<ServerFrame, NodeError>> {
        match self {
            Self::Datagram { channel_count } => vec![decode_server_datagram(chunk, *channel_count)],
            Self::Stream {
                buf,
                next_channel,
                channel_count,
            } => {
                if *next_channel >= *channel_count {
                    // negotiation complete, later bytes carry no meaning
                    return Vec::new();
                }
                buf.extend_from_slice(chunk);
                let mut frames = Vec::new();
                while *next_channel < *channel_count
                    && buf.len() >= wire::STREAM_PARAMETER_FRAME_SIZE
                {
                    let sampling_period_ms = buf.get_u32_le();
                    let batch_size = buf.get_u8();
                    frames.push(Ok(ServerFrame::SetParameters {
                        channel_id: *next_channel,
                        params: ChannelParams::new(sampling_period_ms, batch_size),
                    }));
                    *next_channel += 1;
                }
                if *next_channel >= *channel_count {
                    buf.clear();
                }
                frames
            }
        }
    }
}

/// Decode one server datagram
pub fn decode_server_datagram(datagram: &[u8], channel_count: u8) -> Result<ServerFrame, NodeError> {
    let Some((&kind, mut body)) = datagram.split_first() else {
        return Err(NodeError::malformed("empty datagram"));
    };
    match kind {
        server::REQUEST_INFO => Ok(ServerFrame::RequestInfo),
        server::SET_SENSOR_PARAMETERS => {
            if datagram.len() != wire::SET_PARAMETERS_FRAME_SIZE {
                return Err(NodeError::malformed(format!(
                    "SET_SENSOR_PARAMETERS must be {} bytes, got {}",
                    wire::SET_PARAMETERS_FRAME_SIZE,
                    datagram.len()
                )));
            }
            let channel_id = body.get_u8();
            if channel_id >= channel_count {
                return Err(NodeError::malformed(format!(
                    "unknown channel {channel_id} (node has {channel_count})"
                )));
            }
            let sampling_period_ms = body.get_u32_le();
            let batch_size = body.get_u8();
            Ok(ServerFrame::SetParameters {
                channel_id,
                params: ChannelParams::new(sampling_period_ms, batch_size),
            })
        }
        other => Err(NodeError::malformed(format!("unknown server frame type {other:#04x}"))),
    }
}

/// Encode a server frame (collector side)
pub fn encode_server_frame(kind: TransportKind, frame: &ServerFrame) -> Bytes {
    let mut buf = BytesMut::with_capacity(wire::SET_PARAMETERS_FRAME_SIZE);
    match (kind, frame) {
        (TransportKind::Udp, ServerFrame::RequestInfo) => buf.put_u8(server::REQUEST_INFO),
        (TransportKind::Udp, ServerFrame::SetParameters { channel_id, params }) => {
            buf.put_u8(server::SET_SENSOR_PARAMETERS);
            buf.put_u8(*channel_id);
            buf.put_u32_le(params.sampling_period_ms);
            buf.put_u8(params.batch_size);
        }
        // stream framing has no requests, parameters go out in channel order
        (TransportKind::Tcp, ServerFrame::RequestInfo) => {}
        (TransportKind::Tcp, ServerFrame::SetParameters { params, .. }) => {
            buf.put_u32_le(params.sampling_period_ms);
            buf.put_u8(params.batch_size);
        }
    }
    buf.freeze()
}

/// Decode one client datagram (collector side)
pub fn decode_client_datagram(datagram: &[u8]) -> Result<ClientFrame, NodeError> {
    let Some((&kind, mut body)) = datagram.split_first() else {
        return Err(NodeError::malformed("empty datagram"));
    };
    match kind {
        client::KEEP_ALIVE => Ok(ClientFrame::KeepAlive),
        client::INFO => {
            let name_len = usize::from(*body.first().ok_or_else(|| NodeError::malformed("truncated Info"))?);
            body.advance(1);
            if body.len() != name_len + 1 + wire::CLOCK_OFFSET_SIZE {
                return Err(NodeError::malformed("Info length mismatch"));
            }
            let name = String::from_utf8_lossy(&body[..name_len]).into_owned();
            body.advance(name_len);
            let channel_count = body.get_u8();
            let clock_offset_ms = body.get_u64_le();
            Ok(ClientFrame::Info(NodeInfo {
                name,
                channel_count,
                clock_offset_ms,
            }))
        }
        client::SENSOR_SAMPLES => {
            if body.len() < 2 {
                return Err(NodeError::malformed("truncated SensorSamples"));
            }
            let channel_id = body.get_u8();
            let sample_count = body.get_u8();
            if body.len() != usize::from(sample_count) * SAMPLE_SIZE {
                return Err(NodeError::malformed("SensorSamples payload length mismatch"));
            }
            Ok(ClientFrame::SensorSamples {
                channel_id,
                sample_count,
                payload: Bytes::copy_from_slice(body),
            })
        }
        client::ACK => match body {
            [channel_id] => Ok(ClientFrame::Ack {
                channel_id: *channel_id,
            }),
            _ => Err(NodeError::malformed("ACK must be 2 bytes")),
        },
        other => Err(NodeError::malformed(format!("unknown client frame type {other:#04x}"))),
    }
}

/// Reassembles the node's byte stream into frames (collector side)
#[derive(Debug, Default)]
pub struct ClientStreamDecoder {
    buf: BytesMut,
    info_seen: bool,
}

impl ClientStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete frame, `Ok(None)` if more bytes are needed
    pub fn next_frame(&mut self) -> Result<Option<ClientFrame>, NodeError> {
        if !self.info_seen {
            return self.next_info();
        }
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let sample_count = self.buf[1];
        let frame_len = 2 + usize::from(sample_count) * SAMPLE_SIZE;
        if self.buf.len() < frame_len {
            return Ok(None);
        }
        let mut frame = self.buf.split_to(frame_len);
        let channel_id = frame.get_u8();
        let sample_count = frame.get_u8();
        Ok(Some(ClientFrame::SensorSamples {
            channel_id,
            sample_count,
            payload: frame.freeze(),
        }))
    }

    fn next_info(&mut self) -> Result<Option<ClientFrame>, NodeError> {
        let Some(&first) = self.buf.first() else {
            return Ok(None);
        };
        if first != wire::NODE_TYPE_SENSOR {
            return Err(NodeError::malformed(format!("unexpected node type {first:#04x}")));
        }
        let Some(etx) = self.buf.iter().position(|&b| b == wire::NAME_TERMINATOR) else {
            return Ok(None);
        };
        let frame_len = etx + 2 + wire::CLOCK_OFFSET_SIZE;
        if self.buf.len() < frame_len {
            return Ok(None);
        }
        let mut frame = self.buf.split_to(frame_len);
        let name = String::from_utf8_lossy(&frame[1..etx]).into_owned();
        frame.advance(etx + 1);
        let channel_count = frame.get_u8();
        let clock_offset_ms = frame.get_u64_le();
        self.info_seen = true;
        Ok(Some(ClientFrame::Info(NodeInfo {
            name,
            channel_count,
            clock_offset_ms,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Sample;

    fn info() -> NodeInfo {
        NodeInfo {
            name: "node-01".into(),
            channel_count: 3,
            clock_offset_ms: 0x0102_0304_0506_0708,
        }
    }

    fn message(sample_count: u8) -> OutboundMessage {
        let payload: Vec<u8> = (0..sample_count)
            .flat_map(|i| Sample::new(u32::from(i), f64::from(i)).to_bytes())
            .collect();
        OutboundMessage {
            epoch: 0,
            channel_id: 2,
            sample_count,
            payload: payload.into(),
        }
    }

    #[test]
    fn test_stream_info_layout() {
        let frame = Codec::new(TransportKind::Tcp).info(&info());
        let mut expected = vec![0x02];
        expected.extend_from_slice(b"node-01");
        expected.push(0x03);
        expected.push(3);
        expected.extend_from_slice(&[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(frame.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_datagram_info_layout() {
        let frame = Codec::new(TransportKind::Udp).info(&info());
        assert_eq!(&frame[..2], &[0x01, 7]);
        assert_eq!(&frame[2..9], b"node-01");
        assert_eq!(frame[9], 3);
        assert_eq!(frame.len(), 2 + 7 + 1 + 8);
        assert_eq!(decode_client_datagram(&frame).unwrap(), ClientFrame::Info(info()));
    }

    #[test]
    fn test_samples_layout() {
        let stream = Codec::new(TransportKind::Tcp).samples(&message(2));
        assert_eq!(&stream[..2], &[2, 2]);
        assert_eq!(stream.len(), 2 + 24);

        let datagram = Codec::new(TransportKind::Udp).samples(&message(2));
        assert_eq!(&datagram[..3], &[0x02, 2, 2]);
        assert_eq!(&datagram[3..], &stream[2..]);
    }

    #[test]
    fn test_ack_and_keep_alive() {
        let udp = Codec::new(TransportKind::Udp);
        assert_eq!(udp.ack(5).unwrap().as_ref(), &[0x03, 5]);
        assert_eq!(udp.keep_alive().unwrap().as_ref(), &[0x00]);

        let tcp = Codec::new(TransportKind::Tcp);
        assert!(tcp.ack(5).is_none());
        assert!(tcp.keep_alive().is_none());
    }

    #[test]
    fn test_largest_datagram_fits_mtu() {
        let frame = Codec::new(TransportKind::Udp).samples(&message(121));
        assert_eq!(frame.len(), 1455);
    }

    #[test]
    fn test_stream_parameters_split_reads() {
        let mut decoder = ServerDecoder::new(TransportKind::Tcp, 2);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.push(5);
        bytes.extend_from_slice(&250u32.to_le_bytes());
        bytes.push(200);

        assert!(decoder.decode(&bytes[..3]).is_empty());
        let frames = decoder.decode(&bytes[3..7]);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            *frames[0].as_ref().unwrap(),
            ServerFrame::SetParameters {
                channel_id: 0,
                params: ChannelParams::new(10, 5)
            }
        );
        let frames = decoder.decode(&bytes[7..]);
        assert_eq!(
            *frames[0].as_ref().unwrap(),
            ServerFrame::SetParameters {
                channel_id: 1,
                params: ChannelParams::new(250, 200)
            }
        );

        // negotiation complete, trailing bytes ignored
        assert!(decoder.decode(&[1, 2, 3, 4, 5, 6]).is_empty());

        decoder.reset();
        assert_eq!(decoder.decode(&bytes[..5]).len(), 1);
    }

    #[test]
    fn test_datagram_set_parameters() {
        let frame = [0x01, 1, 0x10, 0x27, 0, 0, 8];
        assert_eq!(
            decode_server_datagram(&frame, 2).unwrap(),
            ServerFrame::SetParameters {
                channel_id: 1,
                params: ChannelParams::new(10_000, 8)
            }
        );
        assert_eq!(
            encode_server_frame(
                TransportKind::Udp,
                &decode_server_datagram(&frame, 2).unwrap()
            )
            .as_ref(),
            &frame
        );
    }

    #[test]
    fn test_datagram_malformed() {
        assert!(decode_server_datagram(&[], 2).is_err());
        assert!(decode_server_datagram(&[0x01, 0, 1, 0, 0], 2).is_err());
        assert!(decode_server_datagram(&[0x01, 0, 1, 0, 0, 0, 1, 9], 2).is_err());
        assert!(decode_server_datagram(&[0x01, 2, 1, 0, 0, 0, 1], 2).is_err());
        assert!(decode_server_datagram(&[0x7f], 2).is_err());
        assert_eq!(
            decode_server_datagram(&[0x00], 2).unwrap(),
            ServerFrame::RequestInfo
        );
    }

    #[test]
    fn test_client_stream_decoder() {
        let codec = Codec::new(TransportKind::Tcp);
        let mut stream = Vec::new();
        stream.extend_from_slice(&codec.info(&info()));
        stream.extend_from_slice(&codec.samples(&message(3)));
        stream.extend_from_slice(&codec.samples(&message(1)));

        let mut decoder = ClientStreamDecoder::new();
        decoder.push(&stream[..5]);
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.push(&stream[5..]);

        assert_eq!(decoder.next_frame().unwrap(), Some(ClientFrame::Info(info())));
        match decoder.next_frame().unwrap() {
            Some(ClientFrame::SensorSamples {
                channel_id,
                sample_count,
                payload,
            }) => {
                assert_eq!((channel_id, sample_count), (2, 3));
                assert_eq!(Sample::decode_all(&payload).len(), 3);
            }
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(decoder.next_frame().unwrap().is_some());
        assert_eq!(decoder.next_frame().unwrap(), None);
    }

    #[test]
    fn test_client_datagram_samples_length_checked() {
        let mut frame = Codec::new(TransportKind::Udp).samples(&message(2)).to_vec();
        frame.pop();
        assert!(decode_client_datagram(&frame).is_err());
    }
}
