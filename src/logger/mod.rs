//! Logger module
//!
//! Provides logging utilities for the HTTP server including:
//! - Subscriber setup from the `[logging]` config section
//! - Server lifecycle logging
//! - Connection and request logging
//! - Error and warning logging

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, error, info, warn, Level};

use crate::config::Config;
use crate::server::ConnectionId;

/// Initialize the global subscriber with configuration
///
/// Should be called once at application startup. Unknown levels fall back to `info`.
pub fn init(config: &Config) {
    let level = Level::from_str(&config.logging.level).unwrap_or(Level::INFO);
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_names(true)
        .try_init();
    if installed.is_err() {
        warn!("Logger already initialized, keeping existing subscriber");
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, workers: usize) {
    info!("======================================");
    info!("Reactor server started successfully");
    info!("Listening on: http://{addr}");
    info!("Document root: {}", config.server.root);
    info!("Log level: {}", config.logging.level);
    info!("Worker threads: {workers}");
    info!("Cache budget: {} bytes", config.cache.max_bytes);
    if config.performance.keep_alive_timeout > 0 {
        info!("Idle timeout: {}s", config.performance.keep_alive_timeout);
    }
    if let Some(max) = config.performance.max_connections {
        info!("Max connections: {max}");
    }
    info!("======================================");
}

pub fn log_server_stopped() {
    info!("Server stopped");
}

pub fn log_connection_accepted(id: ConnectionId, peer_addr: &SocketAddr) {
    info!("[Connection] {id} accepted from: {peer_addr}");
}

pub fn log_connection_closed(id: ConnectionId, peer_addr: &SocketAddr, reason: &str) {
    info!("[Connection] {id} ({peer_addr}) closed by {reason}");
}

pub fn log_connection_error(id: ConnectionId, err: &impl std::fmt::Display) {
    error!("[Connection] {id} failed: {err}");
}

pub fn log_connection_rejected(peer_addr: &SocketAddr, limit: usize) {
    warn!("[Connection] Rejected {peer_addr}: limit of {limit} connections reached");
}

pub fn log_dispatch(id: ConnectionId, worker: usize, bytes: usize) {
    debug!("[Dispatch] {id} -> worker {worker} ({bytes} bytes)");
}

pub fn log_request(method: &str, path: &str, file: &Path, content_type: &str) {
    info!("[Request] {method} {path} -> {} ({content_type})", file.display());
}

pub fn log_cache_miss(key: &str) {
    info!("[Cache] miss {key}");
}

pub fn log_cache_hit(key: &str) {
    debug!("[Cache] hit {key}");
}

pub fn log_not_found(path: &str, err: &impl std::fmt::Display) {
    warn!("[404] {path}: {err}");
}

pub fn log_bad_request(id: ConnectionId, err: &impl std::fmt::Display) {
    warn!("[400] {id}: {err}");
}

pub fn log_internal_error(path: &str, err: &impl std::fmt::Display) {
    error!("[500] {path}: {err}");
}

pub fn log_error(message: &str) {
    error!("[ERROR] {message}");
}

pub fn log_warning(message: &str) {
    warn!("[WARN] {message}");
}

pub fn log_shutdown_requested(signal: &str) {
    info!("[SIGNAL] {signal} received, initiating graceful shutdown...");
}
