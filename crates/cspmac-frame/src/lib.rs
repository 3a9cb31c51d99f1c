//! CSP packets and their MAC frame representation.
//!
//! Every frame on the wire is:
//! - A 4-byte big-endian CSP extended identifier
//! - The packet payload, so that the whole frame fits in the interface MTU
//!
//! The frame carries no length field; the receiving side is told how many
//! bytes make up a frame and collects them with an [`Accumulator`].

pub mod accumulator;
pub mod codec;
pub mod error;
pub mod id;
pub mod packet;

pub use accumulator::{Accumulator, RxPhase, RxStep};
pub use codec::{
    check_mtu, decode_packet, decode_slice, encode_packet, encoded_len, HEADER_SIZE, MAX_MTU,
};
pub use error::{FrameError, Result};
pub use id::CspId;
pub use packet::{BufferPool, Packet, PacketBuf, DEFAULT_POOL_SIZE};
