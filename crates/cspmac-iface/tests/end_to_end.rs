use std::sync::Arc;
use std::time::Duration;

use cspmac_frame::{BufferPool, CspId, Packet, MAX_MTU};
use cspmac_iface::{
    open_and_add_interface, register, ErrorCode, InterfaceDescriptor, InterfaceRegistry,
    MacConfig, QueueDispatch, WakeHint, WakeToken,
};
use cspmac_transport::{bridge, RelayQueue, StreamSend, TransportError};

const PACE: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(5);

fn fast(config: MacConfig) -> MacConfig {
    config.with_poll_interval(Duration::from_millis(5))
}

#[test]
fn two_interfaces_back_to_back() {
    let registry = InterfaceRegistry::new();
    let config = fast(MacConfig::default().with_rx_frame_len(7));

    let rx_a = Arc::new(QueueDispatch::new(4));
    let rx_b = Arc::new(QueueDispatch::new(4));
    let a = open_and_add_interface(
        &registry,
        &config.clone().with_name("A"),
        BufferPool::new(4, MAX_MTU),
        rx_a.clone(),
    )
    .unwrap();
    let b = open_and_add_interface(
        &registry,
        &config.with_name("B"),
        BufferPool::new(4, MAX_MTU),
        rx_b.clone(),
    )
    .unwrap();

    let a_to_b = bridge(a.outbound().clone(), b.inbound().clone(), PACE).unwrap();
    let b_to_a = bridge(b.outbound().clone(), a.inbound().clone(), PACE).unwrap();

    a.send(Packet::new(0xAABB_CCDDu32, &[1, 2, 3])).unwrap();
    let got = rx_b.recv_timeout(WAIT).unwrap();
    assert_eq!(got.packet.id().ext(), 0xAABB_CCDD);
    assert_eq!(got.packet.payload(), &[1, 2, 3]);
    assert_eq!(got.iface.name(), "B");

    b.send(Packet::new(0x0102_0304u32, &[9, 8, 7])).unwrap();
    let got = rx_a.recv_timeout(WAIT).unwrap();
    assert_eq!(got.packet.id().ext(), 0x0102_0304);
    assert_eq!(got.iface.name(), "A");

    assert_eq!(a.iface().stats().tx, 1);
    assert_eq!(b.iface().stats().rx, 1);
    assert_eq!(registry.len(), 2);

    a.shutdown();
    b.shutdown();
    assert_eq!(a_to_b.join().unwrap(), 7);
    assert_eq!(b_to_a.join().unwrap(), 7);
}

#[test]
fn several_frames_arrive_in_order() {
    let registry = InterfaceRegistry::new();
    let dispatch = Arc::new(QueueDispatch::new(8));
    let handle = open_and_add_interface(
        &registry,
        &fast(MacConfig::default().with_rx_frame_len(6)),
        BufferPool::new(2, MAX_MTU),
        dispatch.clone(),
    )
    .unwrap();

    for seq in 0u8..3 {
        let id = CspId::new(2, 1, 2, 10, 20, 0);
        let mut frame = id.ext().to_be_bytes().to_vec();
        frame.extend_from_slice(&[seq, seq]);
        for byte in frame {
            handle.rx_from_isr(byte).unwrap();
        }
        let got = dispatch.recv_timeout(WAIT).unwrap();
        assert_eq!(got.packet.id(), id);
        assert_eq!(got.packet.payload(), &[seq, seq]);
    }

    handle.shutdown();
}

#[test]
fn producer_side_fails_fast_when_full_or_closed() {
    let registry = InterfaceRegistry::new();
    let handle = open_and_add_interface(
        &registry,
        &fast(MacConfig::default().with_rx_queue_depth(2)),
        BufferPool::new(1, MAX_MTU),
        Arc::new(QueueDispatch::new(1)),
    )
    .unwrap();
    handle.inbound().close();

    assert!(handle.rx_from_isr(1).is_err());
    handle.shutdown();

    let queue = RelayQueue::new(2);
    queue.try_push_all(&[1, 2]).unwrap();
    assert!(queue.try_push(3).is_err());
    assert_eq!(queue.drain(), vec![1, 2]);
    assert_eq!(queue.stats().dropped, 1);
}

#[test]
fn stream_send_primitive_writes_frames() {
    let registry = InterfaceRegistry::new();
    let stream = Arc::new(StreamSend::new(Vec::new()));
    let iface = register(&registry, InterfaceDescriptor::new("SERIAL", stream.clone())).unwrap();

    cspmac_iface::Route::new(iface)
        .send(Packet::new(0xAABB_CCDDu32, &[1, 2, 3]))
        .unwrap();
    drop(registry);

    let stream = Arc::try_unwrap(stream).ok().unwrap();
    assert_eq!(stream.into_inner(), vec![0xAA, 0xBB, 0xCC, 0xDD, 1, 2, 3]);
}

/// Takes three bytes, then the link drops.
struct DropsMidFrame(Vec<u8>);

impl std::io::Write for DropsMidFrame {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let room = 3usize.saturating_sub(self.0.len());
        if room == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        }
        let n = room.min(buf.len());
        self.0.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn stream_failure_mid_frame_is_tx_error_with_partial_write() {
    let registry = InterfaceRegistry::new();
    let stream = Arc::new(StreamSend::new(DropsMidFrame(Vec::new())));
    let iface = register(&registry, InterfaceDescriptor::new("SERIAL", stream.clone())).unwrap();

    let err = cspmac_iface::Route::new(Arc::clone(&iface))
        .send(Packet::new(0xAABB_CCDDu32, &[1, 2, 3]))
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::TxError);
    assert!(matches!(
        err,
        cspmac_iface::IfaceError::Send(TransportError::PartialWrite { written: 3, len: 7, .. })
    ));
    let stats = iface.stats();
    assert_eq!((stats.tx, stats.tx_error), (0, 1));

    drop(registry);
    drop(iface);
    let stream = Arc::try_unwrap(stream).ok().unwrap();
    assert_eq!(stream.into_inner().0, vec![0xAA, 0xBB, 0xCC]);
}

#[test]
fn oversize_is_tx_error() {
    let registry = InterfaceRegistry::new();
    let handle = open_and_add_interface(
        &registry,
        &fast(MacConfig::default().with_mtu(32)),
        BufferPool::new(1, MAX_MTU),
        Arc::new(QueueDispatch::new(1)),
    )
    .unwrap();

    let err = handle.send(Packet::new(1u32, &[0; 29])).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TxError);
    assert!(handle.outbound().is_empty());
    handle.shutdown();
}

#[test]
fn interrupt_delivery_marks_wake_token() {
    let registry = InterfaceRegistry::new();
    let iface = register(
        &registry,
        InterfaceDescriptor::new("MAC", Arc::new(RelayQueue::new(8))).with_rx_frame_len(4),
    )
    .unwrap();
    let pool = BufferPool::new(1, MAX_MTU);
    let dispatch = QueueDispatch::new(2);
    let token = WakeToken::new();
    let hint = WakeHint::Interrupt(token.clone());

    for byte in [0, 0, 0, 42] {
        cspmac_iface::rx_byte(&iface, byte, &pool, &dispatch, &hint);
    }

    assert!(token.take());
    assert_eq!(dispatch.try_recv().unwrap().packet.id().ext(), 42);
}
