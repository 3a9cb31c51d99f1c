use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::MAX_MTU;
use crate::error::{FrameError, Result};
use crate::id::CspId;

/// Default number of buffers in a pool.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// A fixed-size pool of packet buffers.
///
/// Buffers are handed out as [`PacketBuf`] and go back to the pool when the
/// `PacketBuf` (or the [`Packet`] that owns it) is dropped, so every buffer is
/// released exactly once. Clones share the same pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<BytesMut>>,
    buffer_size: usize,
    count: usize,
}

impl PoolInner {
    fn release(&self, mut data: BytesMut) {
        data.clear();
        // Reclaims the head room given up when a header was stripped.
        data.reserve(self.buffer_size);
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(data);
    }
}

impl BufferPool {
    /// Create a pool of `count` buffers of `buffer_size` bytes each.
    pub fn new(count: usize, buffer_size: usize) -> Self {
        let free = (0..count)
            .map(|_| BytesMut::with_capacity(buffer_size))
            .collect();
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                buffer_size,
                count,
            }),
        }
    }

    /// Take a free buffer, or `None` when the pool is exhausted.
    pub fn alloc(&self) -> Option<PacketBuf> {
        let data = self
            .inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()?;
        Some(PacketBuf {
            data,
            pool: Some(Arc::clone(&self.inner)),
        })
    }

    /// Allocate a packet holding `payload`.
    pub fn packet(&self, id: impl Into<CspId>, payload: &[u8]) -> Result<Packet> {
        if payload.len() > self.inner.buffer_size {
            return Err(FrameError::BufferTooSmall {
                size: payload.len(),
                capacity: self.inner.buffer_size,
            });
        }
        let mut buf = self.alloc().ok_or(FrameError::PoolExhausted)?;
        buf.extend_from_slice(payload);
        Ok(Packet::from_buf(id.into(), buf))
    }

    /// Number of buffers currently free.
    pub fn available(&self) -> usize {
        self.inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total number of buffers owned by the pool.
    pub fn capacity(&self) -> usize {
        self.inner.count
    }

    /// Size of each buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE, MAX_MTU)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .field("capacity", &self.inner.count)
            .field("buffer_size", &self.inner.buffer_size)
            .finish()
    }
}

/// A packet buffer, optionally owned by a [`BufferPool`].
pub struct PacketBuf {
    data: BytesMut,
    pool: Option<Arc<PoolInner>>,
}

impl PacketBuf {
    /// A heap buffer that does not belong to any pool.
    pub fn unpooled(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            pool: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push(&mut self, byte: u8) {
        self.data.extend_from_slice(&[byte]);
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Drop `n` bytes from the front of the buffer.
    pub(crate) fn strip_front(&mut self, n: usize) {
        self.data.advance(n);
    }

    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }
}

impl AsRef<[u8]> for PacketBuf {
    fn as_ref(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl Drop for PacketBuf {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            trace!(len = self.data.len(), "packet buffer released");
            pool.release(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for PacketBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBuf")
            .field("len", &self.data.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

/// A CSP packet: extended identifier plus payload.
///
/// [`len`](Self::len) is the payload length only; the identifier travels as
/// the frame header and is not counted.
pub struct Packet {
    id: CspId,
    buf: PacketBuf,
}

impl Packet {
    /// Create a packet on the heap, outside any pool.
    pub fn new(id: impl Into<CspId>, payload: &[u8]) -> Self {
        let mut buf = PacketBuf::unpooled(payload.len());
        buf.extend_from_slice(payload);
        Self::from_buf(id.into(), buf)
    }

    pub(crate) fn from_buf(id: CspId, buf: PacketBuf) -> Self {
        Self { id, buf }
    }

    pub fn id(&self) -> CspId {
        self.id
    }

    pub fn set_id(&mut self, id: impl Into<CspId>) {
        self.id = id.into();
    }

    pub fn payload(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether the packet's buffer goes back to a pool when dropped.
    pub fn is_pooled(&self) -> bool {
        self.buf.is_pooled()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("id", &self.id)
            .field("len", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_hands_out_and_reclaims_buffers() {
        let pool = BufferPool::new(2, 16);
        assert_eq!(pool.available(), 2);

        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert!(a.is_pooled());
        assert_eq!(pool.available(), 0);
        assert!(pool.alloc().is_none());

        drop(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn packet_from_pool_is_released_on_drop() {
        let pool = BufferPool::new(1, 16);
        let packet = pool.packet(0x1234_5678u32, b"abc").unwrap();

        assert_eq!(packet.id().ext(), 0x1234_5678);
        assert_eq!(packet.payload(), b"abc");
        assert_eq!(packet.len(), 3);
        assert!(packet.is_pooled());
        assert!(matches!(
            pool.packet(1u32, b"x"),
            Err(FrameError::PoolExhausted)
        ));

        drop(packet);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn oversize_payload_is_rejected_by_pool() {
        let pool = BufferPool::new(1, 4);
        let err = pool.packet(0u32, b"too long").unwrap_err();
        assert!(matches!(
            err,
            FrameError::BufferTooSmall {
                size: 8,
                capacity: 4
            }
        ));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn reused_buffer_starts_empty() {
        let pool = BufferPool::new(1, 8);
        let mut buf = pool.alloc().unwrap();
        buf.extend_from_slice(&[1, 2, 3, 4, 5]);
        buf.strip_front(4);
        assert_eq!(buf.as_ref(), &[5]);
        drop(buf);

        let buf = pool.alloc().unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn unpooled_packet() {
        let mut packet = Packet::new(7u32, &[9, 8]);
        assert!(!packet.is_pooled());
        packet.set_id(8u32);
        assert_eq!(packet.id(), CspId::from_ext(8));
        assert_eq!(packet.payload(), &[9, 8]);
        assert!(!packet.is_empty());
    }
}
