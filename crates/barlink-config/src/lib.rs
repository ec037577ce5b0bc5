//! Shared configuration for the barlink indicator server and CLI.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! TOML file (`--config-path` or `BARLINK_CONFIG_PATH`), then `BARLINK_*`
//! environment variables, then command-line flags.

mod defaults;
mod endpoint;
mod logging;
mod workspace;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_HOST, DEFAULT_INDICATOR_NAME,
    DEFAULT_INPUT_WINDOW, DEFAULT_LOG_FILTER, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_FRAME_BYTES,
    DEFAULT_MODEL_FILE, DEFAULT_OBSERVER_QUEUE_CAPACITY, DEFAULT_PORT, default_host,
    default_indicator_name, default_log_filter_string, default_log_format, default_model_file,
};
pub use endpoint::ListenEndpoint;
pub use logging::{LogFormat, LogFormatParseError};
pub use workspace::{COLLECTED_PREFIX, COLLECTED_SUFFIX, WorkPaths, WorkPathsError};

/// Resolved configuration shared by the server and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "BARLINK")]
pub struct Config {
    /// Host name or address the indicator server binds to.
    #[ortho_config(default = defaults::default_host())]
    pub host: String,
    /// TCP port the indicator server binds to.
    #[ortho_config(default = defaults::DEFAULT_PORT)]
    pub port: u16,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Indicator name advertised to trading platforms.
    #[ortho_config(default = defaults::default_indicator_name())]
    pub indicator_name: String,
    /// Model file name, relative to the work directory.
    #[ortho_config(default = defaults::default_model_file())]
    pub model_file: String,
    /// Number of consecutive rows fed to the model as one input vector.
    #[ortho_config(default = defaults::DEFAULT_INPUT_WINDOW)]
    pub input_window: usize,
    /// Maximum number of concurrently served connections.
    #[ortho_config(default = defaults::DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,
    /// Idle bound between accept and the first data row, in milliseconds.
    #[ortho_config(default = defaults::DEFAULT_HANDSHAKE_TIMEOUT_MS)]
    pub handshake_timeout_ms: u64,
    /// Time `stop` waits for connections to drain, in milliseconds.
    #[ortho_config(default = defaults::DEFAULT_DRAIN_TIMEOUT_MS)]
    pub drain_timeout_ms: u64,
    /// Pending lifecycle events buffered per observer.
    #[ortho_config(default = defaults::DEFAULT_OBSERVER_QUEUE_CAPACITY)]
    pub observer_queue_capacity: usize,
    /// Largest accepted protocol frame in bytes.
    #[ortho_config(default = defaults::DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            indicator_name: default_indicator_name(),
            model_file: default_model_file(),
            input_window: DEFAULT_INPUT_WINDOW,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            observer_queue_capacity: DEFAULT_OBSERVER_QUEUE_CAPACITY,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl Config {
    /// Endpoint the indicator server listens on.
    #[must_use]
    pub fn listen_endpoint(&self) -> ListenEndpoint {
        ListenEndpoint::new(self.host.clone(), self.port)
    }

    /// Configured `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Indicator name the server registers.
    #[must_use]
    pub fn indicator_name(&self) -> &str {
        &self.indicator_name
    }

    /// Rolling window length, never less than one row.
    #[must_use]
    pub fn input_window(&self) -> usize {
        self.input_window.max(1)
    }

    /// Idle bound applied before the first data row.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Deadline for draining connections during shutdown.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
