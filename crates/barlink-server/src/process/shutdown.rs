//! Termination signals that end a serving run.
//!
//! Handlers are registered when the listener is constructed, before the
//! server binds, so a signal that arrives while the ready banner is being
//! printed is queued and observed by the first [`ShutdownSignal::wait`].

use std::io;
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Signals that stop a serving run.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Blocks the launch sequence until the server should stop.
pub trait ShutdownSignal: Send {
    /// Returns once shutdown has been requested.
    fn wait(&mut self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Registering the signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Waits for SIGTERM, SIGINT, SIGQUIT, or SIGHUP.
pub struct SystemShutdownSignal {
    signals: Signals,
    drain_timeout: Duration,
}

impl SystemShutdownSignal {
    /// Registers the termination handlers immediately.
    ///
    /// Signals delivered between this call and [`ShutdownSignal::wait`] are
    /// kept pending rather than terminating the process.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] when the handlers cannot be
    /// registered.
    pub fn install(drain_timeout: Duration) -> Result<Self, ShutdownError> {
        let signals = Signals::new(TERMINATION_SIGNALS)
            .map_err(|source| ShutdownError::Install { source })?;
        debug!(
            target: PROCESS_TARGET,
            signals = ?TERMINATION_SIGNALS,
            "termination handlers registered"
        );
        Ok(Self {
            signals,
            drain_timeout,
        })
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&mut self) -> Result<(), ShutdownError> {
        if let Some(signal) = self.signals.forever().next() {
            info!(
                target: PROCESS_TARGET,
                signal,
                drain_timeout_ms = self.drain_timeout.as_millis(),
                "shutdown signal received; draining connections"
            );
        }
        Ok(())
    }
}
