//! Test double for [`ServerReporter`] that records structured events for
//! assertions.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use barlink_config::Config;

use crate::bootstrap::{BootstrapError, IndicatorMode};
use crate::health::ServerReporter;
use crate::server::{DrainReport, ServerError};

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// A model was loaded.
    ModelLoaded { path: PathBuf, input_width: usize },
    /// The listener is accepting.
    Listening { mode: IndicatorMode, addr: SocketAddr },
    /// Shutdown began.
    Stopping,
    /// Shutdown completed with the number of closed connections.
    Stopped { closed: usize },
    /// Shutdown failed.
    StopFailed(String),
}

/// Records server events for assertions.
#[derive(Debug, Default)]
pub struct RecordingServerReporter {
    events: Mutex<Vec<ServerEvent>>,
}

impl RecordingServerReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<ServerEvent> {
        self.events
            .lock()
            .expect("server reporter mutex poisoned")
            .clone()
    }

    /// Returns `true` when any bootstrap failure was recorded.
    #[must_use]
    pub fn saw_bootstrap_failure(&self) -> bool {
        self.events()
            .iter()
            .any(|event| matches!(event, ServerEvent::BootstrapFailed(_)))
    }

    fn record(&self, event: ServerEvent) {
        self.events
            .lock()
            .expect("server reporter mutex poisoned")
            .push(event);
    }
}

impl ServerReporter for RecordingServerReporter {
    fn bootstrap_starting(&self) {
        self.record(ServerEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(ServerEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(ServerEvent::BootstrapFailed(error.to_string()));
    }

    fn model_loaded(&self, path: &Path, input_width: usize) {
        self.record(ServerEvent::ModelLoaded {
            path: path.to_path_buf(),
            input_width,
        });
    }

    fn listening(&self, mode: IndicatorMode, addr: SocketAddr) {
        self.record(ServerEvent::Listening { mode, addr });
    }

    fn stopping(&self) {
        self.record(ServerEvent::Stopping);
    }

    fn stopped(&self, report: &DrainReport) {
        self.record(ServerEvent::Stopped {
            closed: report.closed,
        });
    }

    fn stop_failed(&self, error: &ServerError) {
        self.record(ServerEvent::StopFailed(error.to_string()));
    }
}
