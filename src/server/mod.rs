// Server module entry
// Reactor thread, connection bookkeeping and the handoff used by workers

pub mod connection;
pub mod handoff;
pub mod listener;
pub mod reactor;
pub mod runtime;
pub mod signal;

pub use connection::ConnectionId;
pub use handoff::{ReactorHandle, ResponseSink};
pub use reactor::{Reactor, ReactorLimits};
pub use runtime::{start, start_with, ServerHandle};
pub use signal::install_shutdown_handler;
