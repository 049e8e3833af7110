//! Request handler module
//!
//! Worker threads that turn raw connection bytes into static file responses.

pub mod pool;
pub mod static_files;
pub mod worker;

pub use pool::{spawn_workers, Dispatcher, Job, PendingSegment, WorkerPool};
pub use static_files::{FileSystem, OsFileSystem, ServeError};
pub use worker::{ServeSettings, Worker};
