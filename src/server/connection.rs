// Connection module
// Reactor-side state of one client socket and the outbound flush routine

use bytes::{Buf, Bytes};
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Opaque connection identity, stable for the connection's lifetime and
/// never reused within a process. Doubles as the poll token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(usize);

impl ConnectionId {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn token(self) -> Token {
        Token(self.0)
    }

    pub const fn from_token(token: Token) -> Self {
        Self(token.0)
    }

    /// Worker owning this connection's parse state; pure in `self`
    pub const fn worker_index(self, worker_count: usize) -> usize {
        self.0 % worker_count
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// A registered client socket owned by the reactor
pub struct Connection {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    interest: Interest,
    last_activity: Instant,
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            stream,
            peer_addr,
            interest: Interest::READABLE,
            last_activity: Instant::now(),
        }
    }

    pub const fn interest(&self) -> Interest {
        self.interest
    }

    /// Re-register with a new interest set (always re-arms the registration)
    pub fn set_interest(&mut self, registry: &Registry, id: ConnectionId, interest: Interest) -> io::Result<()> {
        registry.reregister(&mut self.stream, id.token(), interest)?;
        self.interest = interest;
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

/// Write queued buffers front-to-back until the queue is empty or the
/// writer would block. A partially written buffer stays at the head holding
/// only its unwritten remainder.
///
/// Returns `Ok(true)` once the queue is fully drained.
pub fn drain_queue<W: Write>(writer: &mut W, queue: &mut VecDeque<Bytes>) -> io::Result<bool> {
    while let Some(front) = queue.front_mut() {
        if front.is_empty() {
            queue.pop_front();
            continue;
        }
        match writer.write(front) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => {
                front.advance(n);
                if front.is_empty() {
                    queue.pop_front();
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
