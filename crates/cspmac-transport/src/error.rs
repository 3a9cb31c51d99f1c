/// Errors that can occur while moving bytes between the interface and the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The relay queue has no room; the bytes were dropped.
    #[error("relay queue full ({needed} bytes needed, {free} free of {depth})")]
    QueueFull {
        needed: usize,
        free: usize,
        depth: usize,
    },

    /// The relay queue has been closed and no more bytes will flow.
    #[error("relay queue closed")]
    Closed,

    /// The send primitive rejected the frame.
    #[error("send rejected: {0}")]
    Rejected(String),

    /// A stream failed after part of the frame was already written.
    ///
    /// The first `written` bytes are on the wire; the peer sees a torn frame.
    #[error("stream failed after {written} of {len} frame bytes: {source}")]
    PartialWrite {
        written: usize,
        len: usize,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
