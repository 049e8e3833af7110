//! Reactor: the single thread that owns socket readiness
//!
//! The reactor owns the listening socket, every client socket and the poll
//! registry. It accepts connections, reads inbound bytes and fans them out
//! to workers, and flushes outbound queues when sockets become writable.
//! Workers reach it only through [`ReactorHandle`].
//!
//! Per connection: `ACCEPTED -> READABLE <-> WRITABLE -> CLOSED`.
//!
//! mio readiness is edge-triggered, so accept and read loop until
//! `WouldBlock`, and a writable edge drains as much of the queue as the
//! socket takes.

use bytes::Bytes;
use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use std::collections::HashMap;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::connection::{drain_queue, Connection, ConnectionId};
use super::handoff::ReactorHandle;
use super::listener::create_listener;
use crate::config::PerformanceConfig;
use crate::error::{Result, ServerError};
use crate::handler::Dispatcher;
use crate::logger;

/// Scratch read size per `read` call; a tuning knob, not a protocol limit
pub const READ_BUFFER_SIZE: usize = 8912;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;
const EVENTS_CAPACITY: usize = 1024;
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Connection lifetime limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactorLimits {
    pub idle_timeout: Option<Duration>,
    pub max_connections: Option<usize>,
}

impl ReactorLimits {
    pub fn from_config(performance: &PerformanceConfig) -> Self {
        Self {
            idle_timeout: (performance.keep_alive_timeout > 0)
                .then(|| Duration::from_secs(performance.keep_alive_timeout)),
            max_connections: performance.max_connections,
        }
    }
}

enum ReadOutcome {
    Open,
    Eof,
}

pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: HashMap<ConnectionId, Connection>,
    next_id: usize,
    scratch: Box<[u8]>,
    handle: ReactorHandle,
    limits: ReactorLimits,
    last_sweep: Instant,
}

impl Reactor {
    /// Bind the listening socket and set up the poll. Failure here is fatal.
    pub fn bind(addr: SocketAddr, backlog: i32, limits: ReactorLimits) -> Result<Self> {
        let mut listener =
            create_listener(addr, backlog).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Waker::new(poll.registry(), WAKER)?;

        Ok(Self {
            poll,
            listener,
            local_addr,
            connections: HashMap::new(),
            next_id: FIRST_CONNECTION,
            scratch: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            handle: ReactorHandle::new(waker),
            limits,
            last_sweep: Instant::now(),
        })
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Run the event loop until [`ReactorHandle::shutdown`] is called
    pub fn run(mut self, dispatcher: Dispatcher) -> Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        loop {
            self.apply_changes(&dispatcher);
            if self.handle.is_shutdown() {
                break;
            }

            let timeout = self.limits.idle_timeout.map(|_| SWEEP_INTERVAL);
            self.turn(&mut events, timeout, &dispatcher)?;
        }

        self.close_all(&dispatcher);
        logger::log_server_stopped();
        Ok(())
    }

    /// One poll wait plus the work for the events it returned
    fn turn(&mut self, events: &mut Events, timeout: Option<Duration>, dispatcher: &Dispatcher) -> Result<()> {
        if let Err(e) = self.poll.poll(events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(e.into());
        }

        for event in events.iter() {
            match event.token() {
                LISTENER => self.accept(),
                WAKER => {}
                token => self.connection_event(ConnectionId::from_token(token), event, dispatcher),
            }
        }

        self.sweep_idle(dispatcher);
        Ok(())
    }

    /// Apply interest changes queued by workers since the last iteration
    fn apply_changes(&mut self, dispatcher: &Dispatcher) {
        for change in self.handle.take_changes() {
            let id = change.connection;
            let Some(conn) = self.connections.get_mut(&id) else {
                // Closed while the worker was busy; its bytes have nowhere to go
                self.handle.drop_outbound(id);
                continue;
            };
            if let Err(e) = conn.set_interest(self.poll.registry(), id, change.interest) {
                logger::log_connection_error(id, &e);
                self.close(id, "exception", dispatcher);
            }
        }
    }

    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer_addr)) => {
                    if let Some(limit) = self.limits.max_connections {
                        if self.connection_count() >= limit {
                            logger::log_connection_rejected(&peer_addr, limit);
                            continue;
                        }
                    }

                    let id = ConnectionId::new(self.next_id);
                    self.next_id += 1;

                    if let Err(e) = stream.set_nodelay(true) {
                        logger::log_warning(&format!("{id}: TCP_NODELAY not set: {e}"));
                    }
                    if let Err(e) = self
                        .poll
                        .registry()
                        .register(&mut stream, id.token(), Interest::READABLE)
                    {
                        logger::log_connection_error(id, &e);
                        continue;
                    }

                    logger::log_connection_accepted(id, &peer_addr);
                    self.connections.insert(id, Connection::new(stream, peer_addr));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // e.g. EMFILE; retried on the next readiness edge
                    logger::log_error(&format!("Failed to accept connection: {e}"));
                    break;
                }
            }
        }
    }

    fn connection_event(&mut self, id: ConnectionId, event: &Event, dispatcher: &Dispatcher) {
        if !self.connections.contains_key(&id) {
            return;
        }

        if event.is_readable() || event.is_read_closed() || event.is_error() {
            match self.read(id, dispatcher) {
                Ok(ReadOutcome::Open) => {}
                Ok(ReadOutcome::Eof) => {
                    self.close(id, "shutdown", dispatcher);
                    return;
                }
                Err(e) => {
                    logger::log_connection_error(id, &e);
                    self.close(id, "exception", dispatcher);
                    return;
                }
            }
        }

        if event.is_writable() {
            if let Err(e) = self.write(id) {
                logger::log_connection_error(id, &e);
                self.close(id, "exception", dispatcher);
            }
        }
    }

    /// Read until the socket would block, handing each chunk to the owning worker
    fn read(&mut self, id: ConnectionId, dispatcher: &Dispatcher) -> io::Result<ReadOutcome> {
        let Some(conn) = self.connections.get_mut(&id) else {
            return Ok(ReadOutcome::Open);
        };

        loop {
            match conn.stream.read(&mut self.scratch) {
                Ok(0) => return Ok(ReadOutcome::Eof),
                Ok(n) => {
                    conn.touch();
                    // Copy out: the scratch buffer is reused by the next read
                    dispatcher.dispatch_segment(id, Bytes::copy_from_slice(&self.scratch[..n]));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadOutcome::Open),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Flush the outbound queue; fall back to read interest once it is empty
    fn write(&mut self, id: ConnectionId) -> io::Result<()> {
        let Some(conn) = self.connections.get_mut(&id) else {
            return Ok(());
        };

        let drained = self
            .handle
            .with_outbound(id, |queue| drain_queue(&mut conn.stream, queue))
            .transpose()?
            .unwrap_or(true);
        conn.touch();

        if drained && conn.interest().is_writable() {
            conn.set_interest(self.poll.registry(), id, Interest::READABLE)?;
        }
        Ok(())
    }

    fn sweep_idle(&mut self, dispatcher: &Dispatcher) {
        let Some(timeout) = self.limits.idle_timeout else {
            return;
        };
        let now = Instant::now();
        if now.saturating_duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        self.last_sweep = now;

        let idle: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.idle_for(now) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in idle {
            self.close(id, "idle timeout", dispatcher);
        }
    }

    /// Deregister and drop the socket, its queued bytes and its parse state
    fn close(&mut self, id: ConnectionId, reason: &str, dispatcher: &Dispatcher) {
        let Some(mut conn) = self.connections.remove(&id) else {
            return;
        };
        // The socket is closed on drop either way
        let _ = self.poll.registry().deregister(&mut conn.stream);
        let peer_addr = conn.peer_addr;
        drop(conn);
        self.handle.drop_outbound(id);
        dispatcher.dispatch_closed(id);
        logger::log_connection_closed(id, &peer_addr, reason);
    }

    fn close_all(&mut self, dispatcher: &Dispatcher) {
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            self.close(id, "reactor shutdown", dispatcher);
        }
    }

    fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
