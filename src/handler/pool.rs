// Worker pool module
// Fixed set of worker threads, each fed by its own unbounded job channel.
// A connection always maps to the same worker, so its segments are handled
// in arrival order by a single thread.

use bytes::Bytes;
use crossbeam_channel::{unbounded, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::static_files::FileSystem;
use super::worker::{ServeSettings, Worker};
use crate::cache::ResponseCache;
use crate::error::{Result, ServerError};
use crate::logger;
use crate::server::{ConnectionId, ResponseSink};

/// Bytes read from one connection, in read order
#[derive(Debug, Clone)]
pub struct PendingSegment {
    pub connection: ConnectionId,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub enum Job {
    Segment(PendingSegment),
    /// The reactor closed the connection; drop its parse state
    Closed(ConnectionId),
}

/// Reactor-side end of the worker queues
#[derive(Debug, Clone)]
pub struct Dispatcher {
    senders: Vec<Sender<Job>>,
}

impl Dispatcher {
    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    pub fn worker_for(&self, connection: ConnectionId) -> usize {
        connection.worker_index(self.senders.len())
    }

    pub fn dispatch_segment(&self, connection: ConnectionId, data: Bytes) {
        let worker = self.worker_for(connection);
        logger::log_dispatch(connection, worker, data.len());
        self.send(worker, Job::Segment(PendingSegment { connection, data }));
    }

    pub fn dispatch_closed(&self, connection: ConnectionId) {
        self.send(self.worker_for(connection), Job::Closed(connection));
    }

    /// Dispatcher over bare channels, for driving the reactor without workers
    #[cfg(test)]
    pub(crate) fn with_channels(count: usize) -> (Self, Vec<crossbeam_channel::Receiver<Job>>) {
        let (senders, receivers) = (0..count).map(|_| unbounded()).unzip();
        (Self { senders }, receivers)
    }

    fn send(&self, worker: usize, job: Job) {
        if self.senders[worker].send(job).is_err() {
            logger::log_error(&format!("worker {worker} has exited, job dropped"));
        }
    }
}

/// Join handles of the spawned workers
#[derive(Debug)]
pub struct WorkerPool {
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Wait for every worker; they exit once all `Dispatcher` clones are gone
    pub fn join(self) {
        for (i, handle) in self.threads.into_iter().enumerate() {
            if handle.join().is_err() {
                logger::log_error(&format!("worker {i} panicked"));
            }
        }
    }
}

/// Start `count` workers sharing one cache, filesystem and sink
pub fn spawn_workers<S, F>(
    count: usize,
    sink: &S,
    cache: &Arc<ResponseCache>,
    fs: &Arc<F>,
    settings: &Arc<ServeSettings>,
) -> Result<(Dispatcher, WorkerPool)>
where
    S: ResponseSink + Clone + 'static,
    F: FileSystem,
{
    let count = count.max(1);
    let mut senders = Vec::with_capacity(count);
    let mut threads = Vec::with_capacity(count);

    for i in 0..count {
        let (tx, rx) = unbounded();
        let worker = Worker::new(i, sink.clone(), Arc::clone(cache), Arc::clone(fs), Arc::clone(settings));
        let name = format!("worker-{i}");
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.run(&rx))
            .map_err(|source| ServerError::Spawn { name, source })?;
        senders.push(tx);
        threads.push(handle);
    }

    Ok((Dispatcher { senders }, WorkerPool { threads }))
}
