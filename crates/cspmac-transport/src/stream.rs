use std::io::{ErrorKind, Read, Write};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::queue::RelayQueue;
use crate::send::SendPrimitive;

const READ_CHUNK_SIZE: usize = 256;
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

/// Writes each frame to a byte stream in a single locked write.
///
/// Concurrent senders are serialized by the internal lock, so frames from
/// different callers never interleave on the stream. Delivery is best effort:
/// a failure before the first byte is written leaves the stream untouched,
/// but a failure after that returns [`TransportError::PartialWrite`] with the
/// number of bytes already written.
pub struct StreamSend<W> {
    inner: Mutex<W>,
}

impl<W: Write> StreamSend<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Consume the adapter and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> SendPrimitive for StreamSend<W> {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let mut offset = 0usize;
        while offset < frame.len() {
            let err = match inner.write(&frame[offset..]) {
                Ok(0) if offset == 0 => return Err(TransportError::Closed),
                Ok(0) => std::io::Error::from(ErrorKind::WriteZero),
                Ok(n) => {
                    offset += n;
                    continue;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(WOULD_BLOCK_BACKOFF);
                    continue;
                }
                Err(err) => err,
            };
            return Err(torn(offset, frame.len(), err));
        }

        loop {
            match inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(WOULD_BLOCK_BACKOFF)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

fn torn(written: usize, len: usize, source: std::io::Error) -> TransportError {
    if written == 0 {
        return TransportError::Io(source);
    }
    warn!(written, len, error = %source, "stream failed mid-frame");
    TransportError::PartialWrite {
        written,
        len,
        source,
    }
}

/// Copy a byte stream into a relay queue from a background thread.
///
/// Each byte is offered with [`RelayQueue::try_push`], the way a receive
/// interrupt would, so a slow consumer causes drops rather than back-pressure
/// on the stream. The thread ends at EOF, on a read error, or when the queue
/// is closed, and yields the number of bytes read.
pub fn pump_reader<R>(mut reader: R, queue: RelayQueue) -> std::io::Result<JoinHandle<u64>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name("relay_pump".into())
        .spawn(move || {
            let mut total = 0u64;
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            loop {
                let read = match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!(error = %err, "relay pump read failed");
                        break;
                    }
                };
                total += read as u64;

                for &byte in &chunk[..read] {
                    if let Err(TransportError::Closed) = queue.try_push(byte) {
                        debug!(total, "relay pump stopping, queue closed");
                        return total;
                    }
                }
            }
            debug!(total, "relay pump reached end of stream");
            total
        })
}

/// Forward bytes from one relay queue into another, like a wire between two
/// transports.
///
/// The wire is flow controlled: each byte waits up to `pace` for room at the
/// far end before it is dropped. The thread ends when `from` is closed and
/// drained, or when `to` is closed, and yields the number of bytes delivered.
pub fn bridge(
    from: RelayQueue,
    to: RelayQueue,
    pace: Duration,
) -> std::io::Result<JoinHandle<u64>> {
    std::thread::Builder::new()
        .name("relay_bridge".into())
        .spawn(move || {
            let mut delivered = 0u64;
            while let Ok(byte) = from.pop() {
                match to.push_timeout(byte, pace) {
                    Ok(()) => delivered += 1,
                    Err(TransportError::Closed) => break,
                    Err(err) => debug!(error = %err, "relay bridge dropped byte"),
                }
            }
            debug!(delivered, "relay bridge stopped");
            delivered
        })
}
