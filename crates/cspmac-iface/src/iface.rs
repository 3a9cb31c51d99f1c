use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cspmac_frame::{Accumulator, RxPhase, MAX_MTU};
use cspmac_transport::SendPrimitive;
use serde::Serialize;
use tracing::info;

use crate::error::{IfaceError, Result};
use crate::registry::InterfaceRegistry;
use crate::tx::{MacTx, NextHop};

/// Name used when none is given.
pub const DEFAULT_NAME: &str = "MAC";

/// Longest interface name, in characters. Longer names are truncated.
pub const NAME_MAX: usize = 10;

/// Interface-private state supplied at registration.
#[derive(Clone, Default)]
pub struct MacInterfaceData {
    /// Hands encoded frames to the transport.
    pub send: Option<Arc<dyn SendPrimitive>>,
}

impl MacInterfaceData {
    pub fn new(send: Arc<dyn SendPrimitive>) -> Self {
        Self { send: Some(send) }
    }
}

/// Everything needed to register a MAC interface.
#[derive(Clone, Default)]
pub struct InterfaceDescriptor {
    pub name: Option<String>,
    /// Requested MTU in bytes; 0 or anything above [`MAX_MTU`] means `MAX_MTU`.
    pub mtu: usize,
    /// Declared length of received frames; defaults to the MTU.
    pub rx_frame_len: Option<usize>,
    pub data: Option<MacInterfaceData>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>, send: Arc<dyn SendPrimitive>) -> Self {
        Self {
            name: Some(name.into()),
            mtu: 0,
            rx_frame_len: None,
            data: Some(MacInterfaceData::new(send)),
        }
    }

    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn with_rx_frame_len(mut self, len: usize) -> Self {
        self.rx_frame_len = Some(len);
        self
    }
}

/// A registered MAC interface.
pub struct Interface {
    name: String,
    mtu: usize,
    send: Arc<dyn SendPrimitive>,
    rx: Mutex<Accumulator>,
    nexthop: Box<dyn NextHop>,
    pub(crate) counters: Counters,
}

impl Interface {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective MTU (header + payload), in bytes.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// The handler the router calls to transmit on this interface.
    pub fn nexthop(&self) -> &dyn NextHop {
        self.nexthop.as_ref()
    }

    pub fn stats(&self) -> InterfaceStats {
        self.counters.snapshot()
    }

    pub fn rx_phase(&self) -> RxPhase {
        self.rx_state().phase()
    }

    /// Bytes collected so far for the frame being received.
    pub fn rx_count(&self) -> usize {
        self.rx_state().count()
    }

    pub fn rx_frame_len(&self) -> usize {
        self.rx_state().frame_len()
    }

    /// Change the declared length of received frames, clamped to the MTU.
    ///
    /// A frame in progress that already holds the new length is delivered
    /// by the next received byte.
    pub fn set_rx_frame_len(&self, len: usize) {
        self.rx_state().set_frame_len(len, self.mtu);
    }

    pub(crate) fn send_primitive(&self) -> &dyn SendPrimitive {
        self.send.as_ref()
    }

    pub(crate) fn rx_state(&self) -> MutexGuard<'_, Accumulator> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("mtu", &self.mtu)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Register a MAC interface with `registry`.
///
/// The descriptor must carry a name, private data and a send primitive;
/// otherwise [`IfaceError::InvalidArgument`] is returned and nothing is
/// registered. The MTU is clamped, receive state starts idle, and [`MacTx`]
/// becomes the interface's next hop.
pub fn register(
    registry: &InterfaceRegistry,
    descriptor: InterfaceDescriptor,
) -> Result<Arc<Interface>> {
    let InterfaceDescriptor {
        name,
        mtu,
        rx_frame_len,
        data,
    } = descriptor;

    let name = name.ok_or(IfaceError::InvalidArgument("interface name"))?;
    let data = data.ok_or(IfaceError::InvalidArgument("interface data"))?;
    let send = data
        .send
        .ok_or(IfaceError::InvalidArgument("send primitive"))?;
    let name = bounded_name(&name);

    let mtu = clamp_mtu(mtu);
    let frame_len = rx_frame_len.unwrap_or(mtu);

    let iface = Arc::new(Interface {
        name,
        mtu,
        send,
        rx: Mutex::new(Accumulator::new(frame_len, mtu)),
        nexthop: Box::new(MacTx),
        counters: Counters::default(),
    });

    registry.add(Arc::clone(&iface))?;
    info!(iface = %iface.name, mtu, rx_frame_len = frame_len, "mac interface registered");

    Ok(iface)
}

pub(crate) fn bounded_name(name: &str) -> String {
    name.chars().take(NAME_MAX).collect()
}

fn clamp_mtu(mtu: usize) -> usize {
    if mtu == 0 || mtu > MAX_MTU {
        MAX_MTU
    } else {
        mtu
    }
}

/// Point-in-time counters for an interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceStats {
    /// Frames handed to the send primitive.
    pub tx: u64,
    /// Frames received and passed to dispatch.
    pub rx: u64,
    /// Transmit failures (oversize or send primitive error).
    pub tx_error: u64,
    /// Frames that could not be decoded.
    pub rx_error: u64,
    /// Bytes or packets dropped for lack of buffers or queue space.
    pub drop: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) tx: AtomicU64,
    pub(crate) rx: AtomicU64,
    pub(crate) tx_error: AtomicU64,
    pub(crate) rx_error: AtomicU64,
    pub(crate) drop: AtomicU64,
    pub(crate) tx_bytes: AtomicU64,
    pub(crate) rx_bytes: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> InterfaceStats {
        InterfaceStats {
            tx: self.tx.load(Ordering::Relaxed),
            rx: self.rx.load(Ordering::Relaxed),
            tx_error: self.tx_error.load(Ordering::Relaxed),
            rx_error: self.rx_error.load(Ordering::Relaxed),
            drop: self.drop.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
        }
    }
}
