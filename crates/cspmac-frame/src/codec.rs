use bytes::{Buf, BufMut};

use crate::error::{FrameError, Result};
use crate::id::CspId;
use crate::packet::{Packet, PacketBuf};

/// Frame header: the CSP extended identifier, 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest frame a MAC interface carries, header included.
pub const MAX_MTU: usize = 128;

/// The wire size of `packet` (header + payload).
pub fn encoded_len(packet: &Packet) -> usize {
    HEADER_SIZE + packet.len()
}

/// Check that `packet` encodes to at most `mtu` bytes, returning the encoded length.
pub fn check_mtu(packet: &Packet, mtu: usize) -> Result<usize> {
    let len = encoded_len(packet);
    if len > mtu {
        return Err(FrameError::ExceedsMtu { len, mtu });
    }
    Ok(len)
}

/// Encode a packet into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬──────────────────────────┐
/// │ Identifier (4B BE) │ Payload                  │
/// │ CSP id.ext         │ (0..=MTU-4 bytes)        │
/// └────────────────────┴──────────────────────────┘
/// ```
///
/// No MTU check is made here; see [`check_mtu`].
pub fn encode_packet<B: BufMut>(packet: &Packet, dst: &mut B) {
    dst.put_u32(packet.id().ext());
    dst.put_slice(packet.payload());
}

/// Decode the first `total_len` bytes of `buf` as a frame.
///
/// The buffer is reused for the packet: the header is stripped off the front
/// and anything past `total_len` is discarded.
pub fn decode_packet(mut buf: PacketBuf, total_len: usize) -> Result<Packet> {
    if total_len < HEADER_SIZE {
        return Err(FrameError::Truncated {
            len: total_len,
            needed: HEADER_SIZE,
        });
    }
    if buf.len() < total_len {
        return Err(FrameError::Truncated {
            len: buf.len(),
            needed: total_len,
        });
    }

    buf.truncate(total_len);
    let mut header = &buf.as_ref()[..HEADER_SIZE];
    let id = CspId::from_ext(header.get_u32());
    buf.strip_front(HEADER_SIZE);

    Ok(Packet::from_buf(id, buf))
}

/// Decode a complete frame held in a plain slice into a heap packet.
pub fn decode_slice(frame: &[u8]) -> Result<Packet> {
    let mut buf = PacketBuf::unpooled(frame.len());
    buf.extend_from_slice(frame);
    decode_packet(buf, frame.len())
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::packet::BufferPool;

    #[test]
    fn identifier_is_big_endian_on_the_wire() {
        let packet = Packet::new(0x0102_0304u32, &[]);
        let mut buf = BytesMut::new();
        encode_packet(&packet, &mut buf);

        assert_eq!(buf.as_ref(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn encode_reference_frame() {
        let packet = Packet::new(0xAABB_CCDDu32, &[1, 2, 3]);
        let mut buf = BytesMut::new();
        encode_packet(&packet, &mut buf);

        assert_eq!(buf.as_ref(), &[0xAA, 0xBB, 0xCC, 0xDD, 1, 2, 3]);
        assert_eq!(encoded_len(&packet), 7);
    }

    #[test]
    fn encode_into_vec() {
        let mut frame = Vec::new();
        encode_packet(&Packet::new(7u32, b"ok"), &mut frame);
        assert_eq!(frame, vec![0, 0, 0, 7, b'o', b'k']);
    }

    #[test]
    fn decode_strips_header_from_length() {
        let packet = decode_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 1, 2, 3]).unwrap();

        assert_eq!(packet.id().ext(), 0xAABB_CCDD);
        assert_eq!(packet.payload(), &[1, 2, 3]);
        assert_eq!(packet.len(), 3);
    }

    #[test]
    fn decode_header_only_frame() {
        let packet = decode_slice(&[0, 0, 0, 1]).unwrap();
        assert_eq!(packet.id().ext(), 1);
        assert!(packet.is_empty());
    }

    #[test]
    fn decode_rejects_frame_shorter_than_header() {
        let err = decode_slice(&[0xAA, 0xBB]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { len: 2, needed: 4 }));
    }

    #[test]
    fn decode_rejects_declared_length_beyond_buffer() {
        let mut buf = PacketBuf::unpooled(8);
        buf.extend_from_slice(&[0, 0, 0, 0, 1]);
        let err = decode_packet(buf, 6).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { len: 5, needed: 6 }));
    }

    #[test]
    fn decode_ignores_bytes_past_total_length() {
        let mut buf = PacketBuf::unpooled(8);
        buf.extend_from_slice(&[0, 0, 0, 9, 1, 2, 0xEE]);
        let packet = decode_packet(buf, 6).unwrap();
        assert_eq!(packet.payload(), &[1, 2]);
    }

    #[test]
    fn decode_keeps_pool_ownership() {
        let pool = BufferPool::new(1, 16);
        let mut buf = pool.alloc().unwrap();
        buf.extend_from_slice(&[0, 0, 0, 5, 42]);

        let packet = decode_packet(buf, 5).unwrap();
        assert!(packet.is_pooled());
        assert_eq!(pool.available(), 0);
        drop(packet);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn mtu_check() {
        let packet = Packet::new(0u32, &[0; 124]);
        assert_eq!(check_mtu(&packet, MAX_MTU).unwrap(), 128);

        let packet = Packet::new(0u32, &[0; 125]);
        assert!(matches!(
            check_mtu(&packet, MAX_MTU),
            Err(FrameError::ExceedsMtu { len: 129, mtu: 128 })
        ));
    }
}
