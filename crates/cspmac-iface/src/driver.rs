use std::sync::Arc;
use std::time::Duration;

use cspmac_frame::{BufferPool, Packet, DEFAULT_POOL_SIZE, MAX_MTU};
use cspmac_transport::{RelayQueue, TransportError, DEFAULT_QUEUE_DEPTH};
use tracing::{debug, info};

use crate::dispatch::{InboundDispatch, QueueDispatch};
use crate::error::{IfaceError, Result};
use crate::iface::{bounded_name, register, Interface, InterfaceDescriptor, DEFAULT_NAME};
use crate::registry::InterfaceRegistry;
use crate::tx::Route;
use crate::worker::{RxWorker, RxWorkerHandle, DEFAULT_POLL_INTERVAL};

/// Default depth of the outbound relay queue, in bytes.
pub const DEFAULT_TX_QUEUE_DEPTH: usize = 256;

/// Default depth of the router input queue built by [`MacConfig::dispatch`].
pub const DEFAULT_DISPATCH_DEPTH: usize = 16;

/// Settings for [`open_and_add_interface`].
#[derive(Debug, Clone)]
pub struct MacConfig {
    /// Interface name; `None` means [`DEFAULT_NAME`].
    pub name: Option<String>,
    /// Requested MTU; 0 means the maximum.
    pub mtu: usize,
    /// Declared length of received frames; `None` means the MTU.
    pub rx_frame_len: Option<usize>,
    pub rx_queue_depth: usize,
    pub tx_queue_depth: usize,
    pub pool_size: usize,
    pub poll_interval: Duration,
    pub dispatch_depth: usize,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            name: None,
            mtu: 0,
            rx_frame_len: None,
            rx_queue_depth: DEFAULT_QUEUE_DEPTH,
            tx_queue_depth: DEFAULT_TX_QUEUE_DEPTH,
            pool_size: DEFAULT_POOL_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            dispatch_depth: DEFAULT_DISPATCH_DEPTH,
        }
    }
}

impl MacConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn with_rx_frame_len(mut self, len: usize) -> Self {
        self.rx_frame_len = Some(len);
        self
    }

    pub fn with_rx_queue_depth(mut self, depth: usize) -> Self {
        self.rx_queue_depth = depth;
        self
    }

    pub fn with_tx_queue_depth(mut self, depth: usize) -> Self {
        self.tx_queue_depth = depth;
        self
    }

    pub fn with_pool_size(mut self, count: usize) -> Self {
        self.pool_size = count;
        self
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll_interval = poll;
        self
    }

    pub fn with_dispatch_depth(mut self, depth: usize) -> Self {
        self.dispatch_depth = depth;
        self
    }

    /// A buffer pool sized by this config.
    pub fn buffer_pool(&self) -> BufferPool {
        BufferPool::new(self.pool_size, MAX_MTU)
    }

    /// A router input queue sized by this config.
    pub fn dispatch(&self) -> QueueDispatch {
        QueueDispatch::new(self.dispatch_depth)
    }
}

/// Create, register and start a MAC interface.
///
/// The outbound relay queue becomes the interface's send primitive and an
/// inbound relay queue is created for the transport's receive side. A
/// `mac_rx` worker drains the inbound queue into `dispatch`. If the worker
/// cannot be started the interface is removed from `registry` again.
pub fn open_and_add_interface(
    registry: &InterfaceRegistry,
    config: &MacConfig,
    pool: BufferPool,
    dispatch: Arc<dyn InboundDispatch>,
) -> Result<MacHandle> {
    let name = bounded_name(config.name.as_deref().unwrap_or(DEFAULT_NAME));
    let outbound = RelayQueue::new(config.tx_queue_depth);
    let inbound = RelayQueue::new(config.rx_queue_depth);

    let mut descriptor =
        InterfaceDescriptor::new(name, Arc::new(outbound.clone())).with_mtu(config.mtu);
    if let Some(len) = config.rx_frame_len {
        descriptor = descriptor.with_rx_frame_len(len);
    }
    let iface = register(registry, descriptor)?;

    let worker = RxWorker::new(Arc::clone(&iface), inbound.clone(), pool, dispatch)
        .with_poll_interval(config.poll_interval);
    let worker = match worker.spawn() {
        Ok(worker) => worker,
        Err(err) => {
            registry.remove(iface.name());
            return Err(IfaceError::Spawn(err));
        }
    };

    info!(
        iface = %iface.name(),
        mtu = iface.mtu(),
        rx_depth = inbound.depth(),
        tx_depth = outbound.depth(),
        "mac interface opened"
    );

    Ok(MacHandle {
        iface,
        inbound,
        outbound,
        worker: Some(worker),
    })
}

/// A running MAC interface: its registration, relay queues and rx worker.
pub struct MacHandle {
    iface: Arc<Interface>,
    inbound: RelayQueue,
    outbound: RelayQueue,
    worker: Option<RxWorkerHandle>,
}

impl MacHandle {
    pub fn iface(&self) -> &Arc<Interface> {
        &self.iface
    }

    /// A route out of this interface.
    pub fn route(&self) -> Route {
        Route::new(Arc::clone(&self.iface))
    }

    /// Transmit `packet` on this interface.
    pub fn send(&self, packet: Packet) -> Result<()> {
        self.route().send(packet)
    }

    /// Offer one received byte from the transport's receive interrupt.
    ///
    /// Never blocks. When the inbound queue is full the byte is dropped and
    /// [`TransportError::QueueFull`] is returned.
    pub fn rx_from_isr(&self, byte: u8) -> std::result::Result<(), TransportError> {
        self.inbound.try_push(byte)
    }

    /// Producer end of the inbound relay queue, for transport drivers.
    pub fn inbound(&self) -> &RelayQueue {
        &self.inbound
    }

    /// Consumer end of the outbound relay queue, for transport drivers.
    pub fn outbound(&self) -> &RelayQueue {
        &self.outbound
    }

    /// Stop the rx worker and close both relay queues.
    ///
    /// Returns the number of bytes the worker consumed. The interface stays
    /// registered.
    pub fn shutdown(mut self) -> u64 {
        let consumed = self.stop_worker();
        debug!(iface = %self.iface.name(), consumed, "mac interface shut down");
        consumed
    }

    fn stop_worker(&mut self) -> u64 {
        self.outbound.close();
        self.worker.take().map_or(0, RxWorkerHandle::shutdown)
    }
}

impl Drop for MacHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            worker.stop();
        }
    }
}

impl std::fmt::Debug for MacHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacHandle")
            .field("iface", &self.iface.name())
            .field("inbound", &self.inbound)
            .field("outbound", &self.outbound)
            .finish()
    }
}
