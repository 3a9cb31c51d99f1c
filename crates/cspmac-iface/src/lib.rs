//! The CSP MAC interface.
//!
//! This is the layer the CSP router talks to. It registers a MAC interface,
//! turns outgoing packets into frames for the transport, and turns bytes
//! arriving from the transport back into packets for the router.
//!
//! Most users only need [`open_and_add_interface`], which wires the relay
//! queues, registers the interface and starts its receive worker.

pub mod dispatch;
pub mod driver;
pub mod error;
pub mod iface;
pub mod registry;
pub mod rx;
pub mod tx;
pub mod worker;

pub use dispatch::{InboundDispatch, InboundPacket, QueueDispatch, WakeHint, WakeToken};
pub use driver::{
    open_and_add_interface, MacConfig, MacHandle, DEFAULT_DISPATCH_DEPTH, DEFAULT_TX_QUEUE_DEPTH,
};
pub use error::{ErrorCode, IfaceError, Result};
pub use iface::{
    register, Interface, InterfaceDescriptor, InterfaceStats, MacInterfaceData, DEFAULT_NAME,
    NAME_MAX,
};
pub use registry::InterfaceRegistry;
pub use rx::{assemble, rx_byte};
pub use tx::{transmit, MacTx, NextHop, Route};
pub use worker::{RxWorker, RxWorkerHandle, DEFAULT_POLL_INTERVAL};
