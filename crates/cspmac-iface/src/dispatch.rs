use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cspmac_frame::Packet;
use tracing::{trace, warn};

use crate::iface::{Counters, Interface};

/// Flag raised when delivery from an interrupt context makes a
/// higher-priority task runnable.
///
/// The interrupt handler checks it on exit to decide whether to yield.
#[derive(Debug, Clone, Default)]
pub struct WakeToken(Arc<AtomicBool>);

impl WakeToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_woken(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Read and clear the flag.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Execution context of the caller that completed a frame.
#[derive(Debug, Clone, Default)]
pub enum WakeHint {
    /// Ordinary task context.
    #[default]
    Task,
    /// Interrupt context; the dispatcher raises the token if it wakes a task.
    Interrupt(WakeToken),
}

/// The stack's inbound hand-off.
///
/// Receives every decoded packet together with the interface it arrived on.
/// Ownership of the packet passes to the dispatcher.
pub trait InboundDispatch: Send + Sync {
    fn deliver(&self, packet: Packet, iface: &Arc<Interface>, hint: &WakeHint);
}

/// A packet waiting in a [`QueueDispatch`].
#[derive(Debug)]
pub struct InboundPacket {
    pub packet: Packet,
    pub iface: Arc<Interface>,
}

/// Bounded router input queue.
///
/// When the queue is full the packet is dropped and counted against the
/// interface it arrived on.
pub struct QueueDispatch {
    tx: SyncSender<InboundPacket>,
    rx: Mutex<Receiver<InboundPacket>>,
    depth: usize,
}

impl QueueDispatch {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        let (tx, rx) = mpsc::sync_channel(depth);
        Self {
            tx,
            rx: Mutex::new(rx),
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Wait for the next packet.
    pub fn recv(&self) -> Option<InboundPacket> {
        self.receiver().recv().ok()
    }

    /// Wait up to `timeout` for the next packet.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InboundPacket> {
        match self.receiver().recv_timeout(timeout) {
            Ok(packet) => Some(packet),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<InboundPacket> {
        match self.receiver().try_recv() {
            Ok(packet) => Some(packet),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn receiver(&self) -> std::sync::MutexGuard<'_, Receiver<InboundPacket>> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InboundDispatch for QueueDispatch {
    fn deliver(&self, packet: Packet, iface: &Arc<Interface>, hint: &WakeHint) {
        let inbound = InboundPacket {
            packet,
            iface: Arc::clone(iface),
        };
        match self.tx.try_send(inbound) {
            Ok(()) => {
                trace!(iface = %iface.name(), "packet queued for router");
                if let WakeHint::Interrupt(token) = hint {
                    token.wake();
                }
            }
            Err(TrySendError::Full(dropped) | TrySendError::Disconnected(dropped)) => {
                warn!(iface = %iface.name(), id = %dropped.packet.id(), "router queue full, dropping packet");
                Counters::bump(&iface.counters.drop, 1);
            }
        }
    }
}

impl fmt::Debug for QueueDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueDispatch")
            .field("depth", &self.depth)
            .finish()
    }
}
