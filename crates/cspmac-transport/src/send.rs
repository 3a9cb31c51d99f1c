use crate::error::Result;
use crate::queue::RelayQueue;

/// Hands an encoded frame to the transport.
///
/// The interface calls this once per frame with the complete wire bytes.
/// Queue-backed primitives such as [`RelayQueue`] either accept the whole
/// frame or fail without putting any of it on the wire. Stream-backed
/// primitives cannot take back bytes the stream already accepted, so an I/O
/// failure part way through a frame is reported as
/// [`TransportError::PartialWrite`](crate::TransportError::PartialWrite).
pub trait SendPrimitive: Send + Sync {
    fn send(&self, frame: &[u8]) -> Result<()>;
}

impl<F> SendPrimitive for F
where
    F: Fn(&[u8]) -> Result<()> + Send + Sync,
{
    fn send(&self, frame: &[u8]) -> Result<()> {
        self(frame)
    }
}

/// Queues the frame on an outbound relay queue for the transport driver.
impl SendPrimitive for RelayQueue {
    fn send(&self, frame: &[u8]) -> Result<()> {
        self.try_push_all(frame)
    }
}
