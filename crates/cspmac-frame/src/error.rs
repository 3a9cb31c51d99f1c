/// Errors that can occur while building, encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes are available than the frame requires.
    #[error("truncated frame ({len} bytes, need {needed})")]
    Truncated { len: usize, needed: usize },

    /// The encoded frame would not fit in the interface MTU.
    #[error("frame exceeds mtu ({len} bytes, mtu {mtu})")]
    ExceedsMtu { len: usize, mtu: usize },

    /// The payload does not fit in a pool buffer.
    #[error("payload too large for buffer ({size} bytes, capacity {capacity})")]
    BufferTooSmall { size: usize, capacity: usize },

    /// The buffer pool has no free buffers.
    #[error("buffer pool exhausted")]
    PoolExhausted,
}

pub type Result<T> = std::result::Result<T, FrameError>;
