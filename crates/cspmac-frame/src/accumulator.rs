use tracing::{trace, warn};

use crate::codec::HEADER_SIZE;
use crate::packet::{BufferPool, PacketBuf};

/// Where the accumulator stands in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxPhase {
    /// No frame in progress.
    Idle,
    /// A frame is in progress and still short of its declared length.
    Accumulating,
    /// The declared length has been reached; the frame is waiting to be taken.
    Complete,
}

/// Outcome of feeding one byte to an [`Accumulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStep {
    /// No buffer could be allocated to start a frame; the byte was dropped.
    Dropped,
    /// The byte was stored; `count` bytes of the frame have arrived so far.
    Accumulating { count: usize },
    /// The byte completed the frame. Call [`Accumulator::take_frame`].
    Complete,
}

/// Collects bytes into frames of a declared length.
///
/// The wire carries no length field, so the frame length is configured up
/// front (typically the fixed frame size of the radio) and can be changed
/// between frames. At most one frame is in progress at a time.
#[derive(Debug)]
pub struct Accumulator {
    packet: Option<PacketBuf>,
    count: usize,
    frame_len: usize,
}

impl Accumulator {
    /// Create an idle accumulator for frames of `frame_len` bytes, clamped to
    /// `[HEADER_SIZE, mtu]`.
    pub fn new(frame_len: usize, mtu: usize) -> Self {
        Self {
            packet: None,
            count: 0,
            frame_len: clamp_frame_len(frame_len, mtu),
        }
    }

    /// Declared length of the frames being collected.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Change the declared frame length, clamped to `[HEADER_SIZE, mtu]`.
    ///
    /// Takes effect for the frame in progress as well. A frame that already
    /// holds exactly the new length becomes [`RxPhase::Complete`] and waits
    /// for [`take_frame`](Self::take_frame); one that holds more is discarded.
    pub fn set_frame_len(&mut self, frame_len: usize, mtu: usize) {
        self.frame_len = clamp_frame_len(frame_len, mtu);
        if self.count > self.frame_len {
            warn!(
                count = self.count,
                frame_len = self.frame_len,
                "discarding partial frame longer than new frame length"
            );
            self.reset();
        }
    }

    /// Bytes collected for the frame in progress.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn phase(&self) -> RxPhase {
        match &self.packet {
            None => RxPhase::Idle,
            Some(_) if self.count >= self.frame_len => RxPhase::Complete,
            Some(_) => RxPhase::Accumulating,
        }
    }

    /// Feed one byte.
    ///
    /// From `Idle` a buffer is taken from `pool` and the byte starts a new
    /// frame; if the pool is empty the byte is dropped and the accumulator
    /// stays idle.
    pub fn push(&mut self, byte: u8, pool: &BufferPool) -> RxStep {
        if self.phase() == RxPhase::Complete {
            warn!(
                frame_len = self.frame_len,
                "completed frame was never taken, discarding it"
            );
            self.reset();
        }

        if self.packet.is_none() {
            match pool.alloc() {
                Some(buf) => {
                    self.packet = Some(buf);
                    self.count = 0;
                }
                None => {
                    trace!("no packet buffer available, dropping byte");
                    return RxStep::Dropped;
                }
            }
        }
        let Some(buf) = self.packet.as_mut() else {
            return RxStep::Dropped;
        };

        buf.push(byte);
        self.count += 1;

        if self.count >= self.frame_len {
            RxStep::Complete
        } else {
            RxStep::Accumulating { count: self.count }
        }
    }

    /// Take the completed frame and its length, returning to `Idle`.
    ///
    /// Returns `None` unless the accumulator is in [`RxPhase::Complete`].
    pub fn take_frame(&mut self) -> Option<(PacketBuf, usize)> {
        if self.phase() != RxPhase::Complete {
            return None;
        }
        let len = self.count;
        self.count = 0;
        self.packet.take().map(|buf| (buf, len))
    }

    /// Discard any frame in progress, releasing its buffer.
    pub fn reset(&mut self) {
        self.packet = None;
        self.count = 0;
    }
}

fn clamp_frame_len(frame_len: usize, mtu: usize) -> usize {
    frame_len.clamp(HEADER_SIZE, mtu.max(HEADER_SIZE))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use proptest::prelude::*;

    use super::*;
    use crate::codec::{decode_packet, encode_packet, MAX_MTU};
    use crate::packet::Packet;

    fn feed(acc: &mut Accumulator, pool: &BufferPool, bytes: &[u8]) -> Vec<RxStep> {
        bytes.iter().map(|&b| acc.push(b, pool)).collect()
    }

    #[test]
    fn starts_idle() {
        let acc = Accumulator::new(7, MAX_MTU);
        assert_eq!(acc.phase(), RxPhase::Idle);
        assert_eq!(acc.count(), 0);
        assert_eq!(acc.frame_len(), 7);
    }

    #[test]
    fn reference_frame_reassembles() {
        let pool = BufferPool::new(2, MAX_MTU);
        let mut acc = Accumulator::new(7, MAX_MTU);

        let steps = feed(&mut acc, &pool, &[0xAA, 0xBB, 0xCC, 0xDD, 1, 2, 3]);
        assert_eq!(steps[0], RxStep::Accumulating { count: 1 });
        assert_eq!(steps[5], RxStep::Accumulating { count: 6 });
        assert_eq!(steps[6], RxStep::Complete);
        assert_eq!(acc.phase(), RxPhase::Complete);

        let (buf, len) = acc.take_frame().unwrap();
        assert_eq!(len, 7);
        assert_eq!(acc.phase(), RxPhase::Idle);
        assert_eq!(acc.count(), 0);

        let packet = decode_packet(buf, len).unwrap();
        assert_eq!(packet.id().ext(), 0xAABB_CCDD);
        assert_eq!(packet.payload(), &[1, 2, 3]);
    }

    #[test]
    fn take_frame_before_complete_returns_none() {
        let pool = BufferPool::new(1, MAX_MTU);
        let mut acc = Accumulator::new(5, MAX_MTU);
        feed(&mut acc, &pool, &[1, 2]);

        assert_eq!(acc.phase(), RxPhase::Accumulating);
        assert!(acc.take_frame().is_none());
        assert_eq!(acc.count(), 2);
    }

    #[test]
    fn byte_is_dropped_when_pool_is_empty() {
        let pool = BufferPool::new(1, MAX_MTU);
        let held = pool.alloc().unwrap();
        let mut acc = Accumulator::new(4, MAX_MTU);

        assert_eq!(acc.push(0x11, &pool), RxStep::Dropped);
        assert_eq!(acc.phase(), RxPhase::Idle);
        assert_eq!(acc.count(), 0);

        drop(held);
        assert_eq!(acc.push(0x22, &pool), RxStep::Accumulating { count: 1 });
    }

    #[test]
    fn at_most_one_buffer_in_use() {
        let pool = BufferPool::new(3, MAX_MTU);
        let mut acc = Accumulator::new(6, MAX_MTU);

        feed(&mut acc, &pool, &[1, 2, 3, 4, 5]);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn back_to_back_frames() {
        let pool = BufferPool::new(2, MAX_MTU);
        let mut acc = Accumulator::new(5, MAX_MTU);

        feed(&mut acc, &pool, &[0, 0, 0, 1, 0xA1]);
        let first = acc.take_frame().unwrap();
        feed(&mut acc, &pool, &[0, 0, 0, 2, 0xB2]);
        let second = acc.take_frame().unwrap();

        let first = decode_packet(first.0, first.1).unwrap();
        let second = decode_packet(second.0, second.1).unwrap();
        assert_eq!((first.id().ext(), first.payload()), (1, &[0xA1][..]));
        assert_eq!((second.id().ext(), second.payload()), (2, &[0xB2][..]));
    }

    #[test]
    fn untaken_frame_is_discarded_by_next_byte() {
        let pool = BufferPool::new(2, MAX_MTU);
        let mut acc = Accumulator::new(4, MAX_MTU);

        feed(&mut acc, &pool, &[1, 2, 3, 4]);
        assert_eq!(acc.push(9, &pool), RxStep::Accumulating { count: 1 });
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn frame_len_is_clamped() {
        assert_eq!(Accumulator::new(0, MAX_MTU).frame_len(), HEADER_SIZE);
        assert_eq!(Accumulator::new(500, MAX_MTU).frame_len(), MAX_MTU);
    }

    #[test]
    fn shrinking_frame_len_discards_longer_partial() {
        let pool = BufferPool::new(1, MAX_MTU);
        let mut acc = Accumulator::new(10, MAX_MTU);
        feed(&mut acc, &pool, &[1, 2, 3, 4, 5, 6]);

        acc.set_frame_len(5, MAX_MTU);
        assert_eq!(acc.phase(), RxPhase::Idle);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn shrinking_frame_len_to_count_completes_frame() {
        let pool = BufferPool::new(1, MAX_MTU);
        let mut acc = Accumulator::new(10, MAX_MTU);
        feed(&mut acc, &pool, &[0, 0, 0, 7, 0xEE]);

        acc.set_frame_len(5, MAX_MTU);
        assert_eq!(acc.phase(), RxPhase::Complete);

        let (buf, len) = acc.take_frame().unwrap();
        let packet = decode_packet(buf, len).unwrap();
        assert_eq!((packet.id().ext(), packet.payload()), (7, &[0xEE][..]));
        assert_eq!(acc.phase(), RxPhase::Idle);
    }

    #[test]
    fn reset_releases_buffer() {
        let pool = BufferPool::new(1, MAX_MTU);
        let mut acc = Accumulator::new(8, MAX_MTU);
        acc.push(1, &pool);
        assert_eq!(pool.available(), 0);

        acc.reset();
        assert_eq!(acc.phase(), RxPhase::Idle);
        assert_eq!(pool.available(), 1);
    }

    proptest! {
        #[test]
        fn encoded_frames_reassemble_to_the_same_packet(
            ext in any::<u32>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=MAX_MTU - HEADER_SIZE),
        ) {
            let packet = Packet::new(ext, &payload);
            let mut wire = BytesMut::new();
            encode_packet(&packet, &mut wire);

            let pool = BufferPool::new(1, MAX_MTU);
            let mut acc = Accumulator::new(wire.len(), MAX_MTU);
            let steps = feed(&mut acc, &pool, &wire);
            prop_assert_eq!(steps.last().copied(), Some(RxStep::Complete));

            let (buf, len) = acc.take_frame().unwrap();
            let decoded = decode_packet(buf, len).unwrap();
            prop_assert_eq!(decoded.id().ext(), ext);
            prop_assert_eq!(decoded.payload(), payload.as_slice());
        }
    }
}
