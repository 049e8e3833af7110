// Signal handling module
//
// Supported signals:
// - SIGINT:  Graceful shutdown (Ctrl+C)
// - SIGTERM: Graceful shutdown
//
// Both stop the reactor; the workers finish their queued jobs and exit once
// the reactor drops their queues.

use super::handoff::ReactorHandle;
use crate::error::Result;
use crate::logger;

/// Install the process-wide shutdown handler
///
/// Can only be installed once per process.
pub fn install_shutdown_handler(handle: ReactorHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        logger::log_shutdown_requested("SIGINT/SIGTERM");
        handle.shutdown();
    })?;
    Ok(())
}
