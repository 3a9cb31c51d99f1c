//! Byte-level plumbing between a transport driver and the MAC interface.
//!
//! This is the lowest layer of cspmac. It provides:
//! - [`RelayQueue`], a bounded byte FIFO with a non-blocking producer side
//!   (safe to call from interrupt-like contexts) and a blocking consumer side
//! - [`SendPrimitive`], the capability the interface uses to hand encoded
//!   frames to the transport
//! - stream adapters for wiring a relay queue to any `Read`/`Write` transport

pub mod error;
pub mod queue;
pub mod send;
pub mod stream;

pub use error::{Result, TransportError};
pub use queue::{QueueStats, RelayQueue, DEFAULT_QUEUE_DEPTH};
pub use send::SendPrimitive;
pub use stream::{bridge, pump_reader, StreamSend};
