// Server runtime
// Wires the reactor, the worker pool and the shared cache together and owns
// their threads until shutdown.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::handoff::ReactorHandle;
use super::reactor::{Reactor, ReactorLimits};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::handler::{spawn_workers, FileSystem, OsFileSystem, ServeSettings, WorkerPool};
use crate::logger;

const REACTOR_THREAD: &str = "reactor";

/// A running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    reactor: ReactorHandle,
    reactor_thread: JoinHandle<Result<()>>,
    pool: WorkerPool,
    cache: Arc<ResponseCache>,
}

impl ServerHandle {
    /// The bound address (resolves port 0)
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn reactor_handle(&self) -> ReactorHandle {
        self.reactor.clone()
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Stop the reactor and wait for every thread
    pub fn shutdown(self) -> Result<()> {
        self.reactor.shutdown();
        self.wait()
    }

    /// Block until the reactor stops, then drain and join the workers
    pub fn wait(self) -> Result<()> {
        let reactor_result = self
            .reactor_thread
            .join()
            .unwrap_or_else(|_| Err(ServerError::Io(io::Error::other("reactor thread panicked"))));
        // The reactor dropped the dispatcher on return, so the workers run out of jobs
        self.pool.join();
        reactor_result
    }
}

/// Start serving files from the real filesystem
pub fn start(config: &Config) -> Result<ServerHandle> {
    start_with(config, Arc::new(OsFileSystem))
}

/// Start serving files from `fs`
pub fn start_with<F: FileSystem>(config: &Config, fs: Arc<F>) -> Result<ServerHandle> {
    let addr = config.socket_addr()?;
    let reactor = Reactor::bind(addr, config.server.backlog, ReactorLimits::from_config(&config.performance))?;
    let local_addr = reactor.local_addr();
    let handle = reactor.handle();

    let cache = Arc::new(ResponseCache::new(config.cache.max_bytes));
    let settings = Arc::new(ServeSettings::from_config(config));
    let workers = config.worker_count();
    let (dispatcher, pool) = spawn_workers(workers, &handle, &cache, &fs, &settings)?;

    let reactor_thread = match thread::Builder::new()
        .name(REACTOR_THREAD.to_string())
        .spawn(move || reactor.run(dispatcher))
    {
        Ok(thread) => thread,
        Err(source) => {
            // The closure, and with it the dispatcher, was dropped; workers exit
            pool.join();
            return Err(ServerError::Spawn {
                name: REACTOR_THREAD.to_string(),
                source,
            });
        }
    };

    logger::log_server_start(&local_addr, config, pool.len());

    Ok(ServerHandle {
        local_addr,
        reactor: handle,
        reactor_thread,
        pool,
        cache,
    })
}
