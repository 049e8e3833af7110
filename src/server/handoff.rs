// Cross-thread handoff into the reactor
//
// Workers never touch sockets or the poll registry. They append outbound
// bytes and interest-change requests to shared queues and wake the poll;
// the reactor drains both on its own thread.

use bytes::Bytes;
use mio::{Interest, Waker};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::connection::ConnectionId;
use crate::logger;

/// Destination for response bytes produced by a worker
pub trait ResponseSink: Send + Sync {
    /// Queue `bytes` for `connection`; bytes for one connection go out in call order
    fn send(&self, connection: ConnectionId, bytes: Bytes);
}

/// Request to change a connection's readiness interest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestChange {
    pub connection: ConnectionId,
    pub interest: Interest,
}

struct Shared {
    changes: Mutex<Vec<InterestChange>>,
    outbound: Mutex<HashMap<ConnectionId, VecDeque<Bytes>>>,
    waker: Waker,
    shutdown: AtomicBool,
}

/// Thread-safe handle into the reactor, cloned into every worker
#[derive(Clone)]
pub struct ReactorHandle {
    shared: Arc<Shared>,
}

impl ReactorHandle {
    pub(crate) fn new(waker: Waker) -> Self {
        Self {
            shared: Arc::new(Shared {
                changes: Mutex::new(Vec::new()),
                outbound: Mutex::new(HashMap::new()),
                waker,
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Ask the reactor to close every connection and return from `run`
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    fn wake(&self) {
        if let Err(e) = self.shared.waker.wake() {
            logger::log_error(&format!("Failed to wake reactor: {e}"));
        }
    }

    /// Drain pending interest changes, oldest first
    pub(crate) fn take_changes(&self) -> Vec<InterestChange> {
        std::mem::take(&mut *self.shared.changes.lock())
    }

    /// Run `f` on the connection's outbound queue, if one exists
    pub(crate) fn with_outbound<R>(
        &self,
        connection: ConnectionId,
        f: impl FnOnce(&mut VecDeque<Bytes>) -> R,
    ) -> Option<R> {
        let mut outbound = self.shared.outbound.lock();
        outbound.get_mut(&connection).map(f)
    }

    /// Release a closed connection's queued bytes
    pub(crate) fn drop_outbound(&self, connection: ConnectionId) {
        self.shared.outbound.lock().remove(&connection);
    }

    pub fn pending_bytes(&self, connection: ConnectionId) -> usize {
        self.shared
            .outbound
            .lock()
            .get(&connection)
            .map_or(0, |queue| queue.iter().map(Bytes::len).sum())
    }
}

impl ResponseSink for ReactorHandle {
    fn send(&self, connection: ConnectionId, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        {
            // Queue and change request are published together
            let mut changes = self.shared.changes.lock();
            self.shared
                .outbound
                .lock()
                .entry(connection)
                .or_default()
                .push_back(bytes);
            changes.push(InterestChange {
                connection,
                interest: Interest::READABLE | Interest::WRITABLE,
            });
        }
        self.wake();
    }
}
