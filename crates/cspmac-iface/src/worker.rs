use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cspmac_frame::BufferPool;
use cspmac_transport::{RelayQueue, TransportError};
use tracing::{debug, info, warn};

use crate::dispatch::{InboundDispatch, WakeHint};
use crate::iface::Interface;
use crate::rx::rx_byte;

/// How long the worker waits for a byte before re-checking its stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const THREAD_NAME: &str = "mac_rx";

/// Drains an inbound relay queue into an interface, one byte at a time.
pub struct RxWorker {
    iface: Arc<Interface>,
    inbound: RelayQueue,
    pool: BufferPool,
    dispatch: Arc<dyn InboundDispatch>,
    stop: Arc<AtomicBool>,
    poll: Duration,
}

impl RxWorker {
    pub fn new(
        iface: Arc<Interface>,
        inbound: RelayQueue,
        pool: BufferPool,
        dispatch: Arc<dyn InboundDispatch>,
    ) -> Self {
        Self {
            iface,
            inbound,
            pool,
            dispatch,
            stop: Arc::new(AtomicBool::new(false)),
            poll: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Run the receive loop on the current thread.
    ///
    /// Returns the number of bytes consumed once the stop flag is set or the
    /// inbound queue is closed and empty.
    pub fn run(&self) -> u64 {
        let mut consumed = 0u64;
        while !self.stop.load(Ordering::Acquire) {
            match self.inbound.pop_timeout(self.poll) {
                Ok(Some(byte)) => {
                    consumed += 1;
                    rx_byte(
                        &self.iface,
                        byte,
                        &self.pool,
                        self.dispatch.as_ref(),
                        &WakeHint::Task,
                    );
                }
                Ok(None) => {}
                Err(TransportError::Closed) => break,
                Err(err) => {
                    warn!(iface = %self.iface.name(), error = %err, "rx worker stopping on queue error");
                    break;
                }
            }
        }
        debug!(iface = %self.iface.name(), consumed, "rx worker stopped");
        consumed
    }

    /// Run the receive loop on a dedicated `mac_rx` thread.
    pub fn spawn(self) -> std::io::Result<RxWorkerHandle> {
        let stop = Arc::clone(&self.stop);
        let inbound = self.inbound.clone();
        let name = self.iface.name().to_string();

        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || self.run())?;

        info!(iface = %name, "rx worker started");
        Ok(RxWorkerHandle {
            stop,
            inbound,
            thread: Some(thread),
        })
    }
}

/// Control handle for a spawned [`RxWorker`].
///
/// Dropping the handle asks the worker to stop but does not wait for it.
pub struct RxWorkerHandle {
    stop: Arc<AtomicBool>,
    inbound: RelayQueue,
    thread: Option<JoinHandle<u64>>,
}

impl RxWorkerHandle {
    /// Ask the worker to stop after its current poll.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the worker, close its inbound queue and wait for it to exit.
    ///
    /// Returns the number of bytes the worker consumed.
    pub fn shutdown(mut self) -> u64 {
        self.stop();
        self.inbound.close();
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(consumed)) => consumed,
            Some(Err(_)) => {
                warn!("rx worker panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for RxWorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
