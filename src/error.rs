//! Server error types
//!
//! Startup and reactor failures. Per-request failures never surface here;
//! they are turned into HTTP error responses by the workers.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors returned while configuring, binding, or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded or deserialized.
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    /// Host/port did not form a valid socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// The listening socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// A worker or reactor thread could not be spawned.
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    /// The shutdown signal handler could not be installed.
    #[error("signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    /// Poll/registration failure inside the reactor.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
