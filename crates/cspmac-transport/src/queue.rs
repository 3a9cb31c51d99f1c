use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{Result, TransportError};

/// Default depth of the inbound relay queue, in bytes.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// A bounded FIFO of raw bytes shared between one side of the transport and
/// the MAC interface.
///
/// Handles are cheap to clone; every clone refers to the same queue. The
/// producer side ([`try_push`](Self::try_push),
/// [`try_push_all`](Self::try_push_all)) never waits for space: when the queue
/// is full the bytes are dropped and counted. The consumer side
/// ([`pop`](Self::pop), [`pop_timeout`](Self::pop_timeout)) blocks until a byte
/// arrives or the queue is closed.
#[derive(Clone)]
pub struct RelayQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    readable: Condvar,
    writable: Condvar,
    depth: usize,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

struct State {
    bytes: VecDeque<u8>,
    closed: bool,
}

/// Point-in-time counters for a relay queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Configured capacity in bytes.
    pub depth: usize,
    /// Bytes currently queued.
    pub len: usize,
    /// Bytes accepted since creation.
    pub pushed: u64,
    /// Bytes dropped because the queue was full.
    pub dropped: u64,
}

impl RelayQueue {
    /// Create a queue holding at most `depth` bytes. A depth of zero is raised to one.
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    bytes: VecDeque::with_capacity(depth),
                    closed: false,
                }),
                readable: Condvar::new(),
                writable: Condvar::new(),
                depth,
                pushed: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Capacity in bytes.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue one byte without waiting.
    ///
    /// Returns [`TransportError::QueueFull`] and drops the byte when there is
    /// no room. The queued bytes are left untouched.
    pub fn try_push(&self, byte: u8) -> Result<()> {
        self.try_push_all(&[byte])
    }

    /// Queue a run of bytes without waiting, all or nothing.
    ///
    /// Either every byte is queued contiguously or none is.
    pub fn try_push_all(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }

        let free = self.inner.depth - state.bytes.len();
        if bytes.len() > free {
            drop(state);
            self.inner
                .dropped
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);
            trace!(
                needed = bytes.len(),
                free,
                depth = self.inner.depth,
                "relay queue full, dropping"
            );
            return Err(TransportError::QueueFull {
                needed: bytes.len(),
                free,
                depth: self.inner.depth,
            });
        }

        state.bytes.extend(bytes.iter().copied());
        drop(state);
        self.inner
            .pushed
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.inner.readable.notify_one();
        Ok(())
    }

    /// Queue one byte, waiting up to `timeout` for room.
    ///
    /// Meant for thread-context producers such as a simulated wire. Interrupt
    /// contexts must use [`try_push`](Self::try_push).
    pub fn push_timeout(&self, byte: u8, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(TransportError::Closed);
            }
            if state.bytes.len() < self.inner.depth {
                state.bytes.push_back(byte);
                drop(state);
                self.inner.pushed.fetch_add(1, Ordering::Relaxed);
                self.inner.readable.notify_one();
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                drop(state);
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(TransportError::QueueFull {
                    needed: 1,
                    free: 0,
                    depth: self.inner.depth,
                });
            }
            state = self
                .inner
                .writable
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Take the oldest byte, blocking until one is available.
    ///
    /// Bytes still queued when the queue is closed are delivered first;
    /// afterwards this returns [`TransportError::Closed`].
    pub fn pop(&self) -> Result<u8> {
        let state = self.lock();
        let mut state = self
            .inner
            .readable
            .wait_while(state, |s| s.bytes.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        self.take(&mut state)
    }

    /// Take the oldest byte, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the wait elapsed with nothing to read.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<u8>> {
        let state = self.lock();
        let (mut state, waited) = self
            .inner
            .readable
            .wait_timeout_while(state, timeout, |s| s.bytes.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        if waited.timed_out() && state.bytes.is_empty() && !state.closed {
            return Ok(None);
        }
        self.take(&mut state).map(Some)
    }

    /// Take the oldest byte if one is queued.
    pub fn try_pop(&self) -> Result<Option<u8>> {
        let mut state = self.lock();
        if state.bytes.is_empty() && !state.closed {
            return Ok(None);
        }
        self.take(&mut state).map(Some)
    }

    /// Remove and return everything currently queued.
    pub fn drain(&self) -> Vec<u8> {
        let mut state = self.lock();
        let bytes: Vec<u8> = state.bytes.drain(..).collect();
        drop(state);
        self.inner.writable.notify_all();
        bytes
    }

    /// Close the queue. Producers fail from now on; consumers drain what is
    /// left and then observe [`TransportError::Closed`].
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        debug!(depth = self.inner.depth, "relay queue closed");
        self.inner.readable.notify_all();
        self.inner.writable.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Snapshot of the queue counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            depth: self.inner.depth,
            len: self.len(),
            pushed: self.inner.pushed.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }

    fn take(&self, state: &mut MutexGuard<'_, State>) -> Result<u8> {
        match state.bytes.pop_front() {
            Some(byte) => {
                self.inner.writable.notify_one();
                Ok(byte)
            }
            None => Err(TransportError::Closed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RelayQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("RelayQueue")
            .field("depth", &stats.depth)
            .field("len", &stats.len)
            .field("dropped", &stats.dropped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let queue = RelayQueue::new(8);
        for byte in [1u8, 2, 3, 4] {
            queue.try_push(byte).unwrap();
        }

        let out: Vec<u8> = (0..4).map(|_| queue.pop().unwrap()).collect();
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let queue = RelayQueue::new(DEFAULT_QUEUE_DEPTH);
        for i in 0..DEFAULT_QUEUE_DEPTH {
            queue.try_push(i as u8).unwrap();
        }

        let err = queue.try_push(0xFF).unwrap_err();
        assert!(matches!(
            err,
            TransportError::QueueFull {
                needed: 1,
                free: 0,
                depth: DEFAULT_QUEUE_DEPTH
            }
        ));

        let stats = queue.stats();
        assert_eq!(stats.len, DEFAULT_QUEUE_DEPTH);
        assert_eq!(stats.pushed, DEFAULT_QUEUE_DEPTH as u64);
        assert_eq!(stats.dropped, 1);

        let expected: Vec<u8> = (0..DEFAULT_QUEUE_DEPTH as u8).collect();
        assert_eq!(queue.drain(), expected);
    }

    #[test]
    fn push_all_is_all_or_nothing() {
        let queue = RelayQueue::new(4);
        queue.try_push_all(&[1, 2]).unwrap();

        let err = queue.try_push_all(&[3, 4, 5]).unwrap_err();
        assert!(matches!(err, TransportError::QueueFull { needed: 3, free: 2, .. }));
        assert_eq!(queue.len(), 2);

        queue.try_push_all(&[3, 4]).unwrap();
        assert_eq!(queue.drain(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn zero_depth_is_raised_to_one() {
        let queue = RelayQueue::new(0);
        assert_eq!(queue.depth(), 1);
        queue.try_push(9).unwrap();
        assert!(queue.try_push(10).is_err());
    }

    #[test]
    fn pop_timeout_returns_none_when_idle() {
        let queue = RelayQueue::new(4);
        let got = queue.pop_timeout(Duration::from_millis(5)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn try_pop_on_empty_queue() {
        let queue = RelayQueue::new(4);
        assert!(queue.try_pop().unwrap().is_none());
        queue.try_push(7).unwrap();
        assert_eq!(queue.try_pop().unwrap(), Some(7));
    }

    #[test]
    fn close_drains_then_reports_closed() {
        let queue = RelayQueue::new(4);
        queue.try_push(1).unwrap();
        queue.close();

        assert!(matches!(queue.try_push(2), Err(TransportError::Closed)));
        assert_eq!(queue.pop().unwrap(), 1);
        assert!(matches!(queue.pop(), Err(TransportError::Closed)));
        assert!(matches!(
            queue.pop_timeout(Duration::from_millis(1)),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn close_wakes_blocked_consumer() {
        let queue = RelayQueue::new(4);
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();

        let result = consumer.join().unwrap();
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[test]
    fn blocked_consumer_receives_bytes_across_threads() {
        let queue = RelayQueue::new(2);
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || (0..64).map(|_| queue.pop().unwrap()).collect::<Vec<u8>>())
        };

        for byte in 0..64u8 {
            queue.push_timeout(byte, Duration::from_secs(5)).unwrap();
        }

        let got = consumer.join().unwrap();
        assert_eq!(got, (0..64u8).collect::<Vec<u8>>());
    }

    #[test]
    fn push_timeout_gives_up_when_full() {
        let queue = RelayQueue::new(1);
        queue.try_push(1).unwrap();
        let err = queue.push_timeout(2, Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, TransportError::QueueFull { .. }));
        assert_eq!(queue.stats().dropped, 1);
    }
}
