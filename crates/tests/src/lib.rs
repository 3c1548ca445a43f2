//! # Integration Tests
//!
//! 传感器节点对回环采集端的端到端测试。
//!
//! 覆盖：
//! - 契约快照（示例配置、transport 限制）
//! - 真实 socket 上的 stream 与 datagram 握手
//! - 重连、重新协商与 keepalive 行为

pub mod collector;
pub mod harness;

#[cfg(test)]
mod contract_tests {
    use std::path::Path;

    use config_loader::ConfigLoader;
    use contracts::{SourceConfig, TransportKind, SAMPLE_SIZE};

    #[test]
    fn test_example_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/node.example.toml");
        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.node.name, "bench-node-01");
        assert_eq!(config.server.transport, TransportKind::Udp);
        assert_eq!(config.channel_count(), 4);
        assert_eq!(config.queue_capacity(), 40);
        assert_eq!(config.channels[3].source, SourceConfig::Uptime);
    }

    #[test]
    fn test_datagram_fits_ethernet_mtu() {
        let max = usize::from(TransportKind::Udp.max_samples_per_message());
        // IPv4 (20) + UDP (8) headers inside a 1500-byte MTU
        assert!(3 + max * SAMPLE_SIZE <= 1472);
        assert_eq!(TransportKind::Tcp.max_samples_per_message(), 89);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::future::Future;
    use std::time::Duration;

    use contracts::{ChannelParams, Sample, TransportKind};
    use session::{ClientFrame, ServerFrame};

    use crate::collector::{TcpCollector, TcpPeer, UdpCollector};
    use crate::harness::{counter, fast_config, spawn_node, CLOCK_OFFSET_MS, NODE_NAME};

    /// Poll `condition` until it holds or two seconds pass
    async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn within<T>(future: impl Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), future)
            .await
            .expect("test step timed out")
    }

    fn assert_cadence(samples: &[Sample], period_ms: u32) {
        for pair in samples.windows(2) {
            assert!(pair[1].timestamp_ms.wrapping_sub(pair[0].timestamp_ms) >= period_ms);
            assert_eq!(pair[1].value, pair[0].value + 1.0);
        }
    }

    async fn next_tcp_samples(peer: &mut TcpPeer) -> (u8, Vec<Sample>) {
        match peer.next_frame().await.unwrap() {
            ClientFrame::SensorSamples {
                channel_id,
                sample_count,
                payload,
            } => {
                let samples = Sample::decode_all(&payload);
                assert_eq!(samples.len(), usize::from(sample_count));
                (channel_id, samples)
            }
            other => panic!("expected SensorSamples, got {other:?}"),
        }
    }

    /// Next frame that is neither Info nor KeepAlive
    async fn next_reply(collector: &mut UdpCollector) -> ClientFrame {
        loop {
            match collector.next_frame().await.unwrap() {
                ClientFrame::Info(_) | ClientFrame::KeepAlive => continue,
                frame => return frame,
            }
        }
    }

    /// Negotiate every channel, checking each ACK
    async fn negotiate_udp(collector: &mut UdpCollector, params: &[ChannelParams]) {
        for (id, params) in params.iter().enumerate() {
            let id = id as u8;
            collector.set_params(id, *params).await.unwrap();
            loop {
                match next_reply(collector).await {
                    ClientFrame::Ack { channel_id } => {
                        assert_eq!(channel_id, id);
                        break;
                    }
                    // samples of channels negotiated earlier may not flow yet
                    ClientFrame::SensorSamples { .. } => continue,
                    other => panic!("expected Ack, got {other:?}"),
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tcp_end_to_end() {
        let collector = TcpCollector::bind().await.unwrap();
        let node = spawn_node(
            TransportKind::Tcp,
            collector.port().unwrap(),
            vec![counter(), counter()],
            fast_config(),
        )
        .unwrap();

        let mut peer = collector.accept().await.unwrap();
        let info = peer.expect_info().await.unwrap();
        assert_eq!(info.name, NODE_NAME);
        assert_eq!(info.channel_count, 2);
        assert_eq!(info.clock_offset_ms, CLOCK_OFFSET_MS);

        peer.send_params(&[ChannelParams::new(5, 4), ChannelParams::new(10, 2)])
            .await
            .unwrap();

        let mut first = [None, None];
        while first.iter().any(Option::is_none) {
            let (channel_id, samples) = within(next_tcp_samples(&mut peer)).await;
            let slot = &mut first[usize::from(channel_id)];
            if slot.is_none() {
                *slot = Some(samples);
            }
        }

        let [channel0, channel1] = first.map(Option::unwrap);
        assert_eq!(channel0.len(), 4);
        assert_eq!(channel1.len(), 2);
        // sampling starts with the first pass after negotiation
        assert_eq!(channel0[0].value, 0.0);
        assert_eq!(channel1[0].value, 0.0);
        assert_cadence(&channel0, 5);
        assert_cadence(&channel1, 10);
        assert!(node.link.is_initialized());

        let acquisition = node.shutdown().await;
        assert!(acquisition.batches_queued >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tcp_batch_clamped_to_frame_limit() {
        let collector = TcpCollector::bind().await.unwrap();
        let node = spawn_node(
            TransportKind::Tcp,
            collector.port().unwrap(),
            vec![counter()],
            fast_config(),
        )
        .unwrap();

        let mut peer = collector.accept().await.unwrap();
        peer.expect_info().await.unwrap();
        peer.send_params(&[ChannelParams::new(0, 200)]).await.unwrap();

        let (channel_id, samples) = within(next_tcp_samples(&mut peer)).await;
        assert_eq!(channel_id, 0);
        assert_eq!(samples.len(), 89);
        assert_cadence(&samples, 0);

        node.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tcp_reconnect_renegotiates() {
        let collector = TcpCollector::bind().await.unwrap();
        let node = spawn_node(
            TransportKind::Tcp,
            collector.port().unwrap(),
            vec![counter()],
            fast_config(),
        )
        .unwrap();

        let mut peer = collector.accept().await.unwrap();
        peer.expect_info().await.unwrap();
        peer.send_params(&[ChannelParams::new(1, 5)]).await.unwrap();
        let (_, before) = within(next_tcp_samples(&mut peer)).await;
        assert_eq!(before.len(), 5);
        let epoch = node.link.epoch();

        drop(peer);
        assert!(eventually(|| node.link.epoch() > epoch).await);
        assert!(!node.link.is_initialized());

        let mut peer = collector.accept().await.unwrap();
        let info = peer.expect_info().await.unwrap();
        assert_eq!(info.name, NODE_NAME);

        peer.send_params(&[ChannelParams::new(2, 3)]).await.unwrap();
        let (_, after) = within(next_tcp_samples(&mut peer)).await;
        assert_eq!(after.len(), 3);
        assert_cadence(&after, 2);
        assert!(after[0].value > before[4].value);

        assert!(node.session_metrics.snapshot().reconnects >= 1);
        let acquisition = node.shutdown().await;
        assert!(acquisition.resets >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_udp_end_to_end() {
        let mut collector = UdpCollector::bind().await.unwrap();
        let node = spawn_node(
            TransportKind::Udp,
            collector.port().unwrap(),
            vec![counter(), counter()],
            fast_config(),
        )
        .unwrap();

        let info = collector.expect_info().await.unwrap();
        assert_eq!(info.name, NODE_NAME);
        assert_eq!(info.channel_count, 2);
        assert_eq!(info.clock_offset_ms, CLOCK_OFFSET_MS);

        negotiate_udp(
            &mut collector,
            &[ChannelParams::new(5, 3), ChannelParams::new(5, 2)],
        )
        .await;
        assert!(eventually(|| node.link.is_initialized()).await);

        let mut seen = [false, false];
        while !seen.iter().all(|&s| s) {
            let (channel_id, samples) = within(collector.next_samples()).await.unwrap();
            let expected = if channel_id == 0 { 3 } else { 2 };
            assert_eq!(samples.len(), expected);
            assert_cadence(&samples, 5);
            seen[usize::from(channel_id)] = true;
        }

        // REQUEST_INFO is answered while streaming
        collector.send(&ServerFrame::RequestInfo).await.unwrap();
        let answered = within(async {
            loop {
                if let ClientFrame::Info(info) = collector.next_frame().await.unwrap() {
                    break info;
                }
            }
        })
        .await;
        assert_eq!(answered.channel_count, 2);

        let negotiations = node.session_metrics.snapshot().negotiations;
        assert_eq!(negotiations, 1);
        node.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_udp_malformed_frames_ignored() {
        let mut collector = UdpCollector::bind().await.unwrap();
        let node = spawn_node(
            TransportKind::Udp,
            collector.port().unwrap(),
            vec![counter()],
            fast_config(),
        )
        .unwrap();

        collector.expect_info().await.unwrap();
        // unknown type, truncated SET, channel out of range
        collector.send_raw(&[0x07, 1, 2]).await.unwrap();
        collector.send_raw(&[0x01, 0]).await.unwrap();
        collector
            .set_params(4, ChannelParams::new(5, 2))
            .await
            .unwrap();
        negotiate_udp(&mut collector, &[ChannelParams::new(5, 2)]).await;

        let (channel_id, samples) = within(collector.next_samples()).await.unwrap();
        assert_eq!(channel_id, 0);
        assert_eq!(samples.len(), 2);

        let metrics = node.session_metrics.clone();
        assert!(eventually(|| metrics.snapshot().malformed_frames == 3).await);
        assert_eq!(metrics.snapshot().reconnects, 0);
        node.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_udp_info_resent_until_parameters() {
        let mut collector = UdpCollector::bind().await.unwrap();
        let node = spawn_node(
            TransportKind::Udp,
            collector.port().unwrap(),
            vec![counter()],
            fast_config(),
        )
        .unwrap();

        for _ in 0..3 {
            let frame = collector
                .next_frame_within(Duration::from_secs(1))
                .await
                .unwrap();
            assert!(matches!(frame, ClientFrame::Info(_)));
        }
        assert!(!node.link.is_initialized());

        negotiate_udp(&mut collector, &[ChannelParams::new(1, 1)]).await;
        within(collector.next_samples()).await.unwrap();
        node.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_udp_renegotiation_while_active() {
        let mut collector = UdpCollector::bind().await.unwrap();
        let node = spawn_node(
            TransportKind::Udp,
            collector.port().unwrap(),
            vec![counter()],
            fast_config(),
        )
        .unwrap();

        collector.expect_info().await.unwrap();
        negotiate_udp(&mut collector, &[ChannelParams::new(2, 2)]).await;
        let (_, samples) = within(collector.next_samples()).await.unwrap();
        assert_eq!(samples.len(), 2);
        let epoch = node.link.epoch();
        let generation = node.link.generation();

        collector
            .set_params(0, ChannelParams::new(2, 6))
            .await
            .unwrap();
        // batches queued under the old cadence are still delivered
        let resized = within(async {
            loop {
                let (_, samples) = collector.next_samples().await.unwrap();
                if samples.len() == 6 {
                    break samples;
                }
                assert_eq!(samples.len(), 2);
            }
        })
        .await;
        assert_cadence(&resized, 2);
        assert!(node.link.generation() > generation);
        assert_eq!(node.link.epoch(), epoch);
        assert_eq!(node.session_metrics.snapshot().stale_discarded, 0);

        // only new-size batches from here on
        for _ in 0..3 {
            let (_, samples) = within(collector.next_samples()).await.unwrap();
            assert_eq!(samples.len(), 6);
        }
        node.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_udp_keepalive_on_slow_channel() {
        let mut collector = UdpCollector::bind().await.unwrap();
        let config = session::SessionConfig {
            keepalive_threshold_ms: 100,
            ..fast_config()
        };
        let node = spawn_node(
            TransportKind::Udp,
            collector.port().unwrap(),
            vec![counter()],
            config,
        )
        .unwrap();

        collector.expect_info().await.unwrap();
        // one batch every 5 s, well past the 100 ms threshold
        negotiate_udp(&mut collector, &[ChannelParams::new(5_000, 1)]).await;

        let keepalive = within(async {
            loop {
                if let ClientFrame::KeepAlive = collector.next_frame().await.unwrap() {
                    break true;
                }
            }
        })
        .await;
        assert!(keepalive);
        assert!(node.session_metrics.snapshot().keepalives_sent >= 1);
        node.shutdown().await;
    }
}
