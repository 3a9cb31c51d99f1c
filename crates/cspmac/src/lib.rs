//! CSP MAC link-layer interface adapter.
//!
//! cspmac sits between a byte-oriented transport (a radio, a UART) and the
//! packet-oriented router of a CSP network stack. Outgoing packets are framed
//! as a big-endian identifier followed by the payload; incoming bytes are
//! collected into frames and handed back to the router as packets.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte relay queues, the send primitive capability, stream adapters
//! - [`frame`]: CSP identifiers, packet buffers, the frame codec and byte accumulator
//! - [`iface`]: interface registration, transmit and receive paths, rx worker
//!   (behind the `iface` feature)

/// Re-export transport types.
pub mod transport {
    pub use cspmac_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use cspmac_frame::*;
}

/// Re-export interface types (requires `iface` feature).
#[cfg(feature = "iface")]
pub mod iface {
    pub use cspmac_iface::*;
}
