//! Structured reporting for indicator server lifecycle events.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use barlink_config::Config;

use crate::bootstrap::{BootstrapError, IndicatorMode};
use crate::server::{DrainReport, ServerError};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait ServerReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once a model has been loaded for run mode.
    fn model_loaded(&self, path: &Path, input_width: usize);

    /// Invoked once the listener is bound and accepting.
    fn listening(&self, mode: IndicatorMode, addr: SocketAddr);

    /// Invoked when shutdown begins.
    fn stopping(&self);

    /// Invoked after every connection drained in time.
    fn stopped(&self, report: &DrainReport);

    /// Invoked when shutdown did not complete cleanly.
    fn stop_failed(&self, error: &ServerError);
}

impl<T> ServerReporter for Arc<T>
where
    T: ServerReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn model_loaded(&self, path: &Path, input_width: usize) {
        (**self).model_loaded(path, input_width);
    }

    fn listening(&self, mode: IndicatorMode, addr: SocketAddr) {
        (**self).listening(mode, addr);
    }

    fn stopping(&self) {
        (**self).stopping();
    }

    fn stopped(&self, report: &DrainReport) {
        (**self).stopped(report);
    }

    fn stop_failed(&self, error: &ServerError) {
        (**self).stop_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredServerReporter;

impl StructuredServerReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ServerReporter for StructuredServerReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting indicator server bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            endpoint = %config.listen_endpoint(),
            indicator = config.indicator_name(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "indicator server bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "indicator server bootstrap failed"
        );
    }

    fn model_loaded(&self, path: &Path, input_width: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "model_loaded",
            path = %path.display(),
            input_width,
            "model loaded"
        );
    }

    fn listening(&self, mode: IndicatorMode, addr: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listening",
            mode = %mode,
            local_addr = %addr,
            "waiting for connections"
        );
    }

    fn stopping(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stopping",
            "indicator server stopping"
        );
    }

    fn stopped(&self, report: &DrainReport) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stopped",
            closed = report.closed,
            elapsed_ms = report.elapsed.as_millis(),
            "indicator server stopped"
        );
    }

    fn stop_failed(&self, error: &ServerError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "stop_failed",
            error = %error,
            error_debug = ?error,
            "indicator server did not stop cleanly"
        );
    }
}
