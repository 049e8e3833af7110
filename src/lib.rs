//! Static file HTTP server built on a single readiness reactor and a fixed
//! pool of worker threads.
//!
//! The reactor owns every socket. Workers parse request heads, serve files
//! through a shared byte-budgeted response cache and hand response bytes back
//! through [`server::ReactorHandle`].

pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;

pub use crate::cache::{CacheEntry, ResponseCache};
pub use crate::config::{CliArgs, Config};
pub use crate::error::{Result, ServerError};
pub use crate::server::{start, start_with, ServerHandle};
