//! Process-wide tracing subscriber for the indicator server.
//!
//! Events from every `barlink-server` target (`::transport`, `::session`,
//! `::server`, `::observer`, `::process`, `::health`) go to stderr. Stdout is
//! left to the CLI, which prints the operator banners there.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use barlink_config::{Config, LogFormat};

/// Format chosen by the call that installed the subscriber.
static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Describes the subscriber that is active after [`initialise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
    installed_now: bool,
}

impl TelemetryHandle {
    /// Output format of the active subscriber.
    ///
    /// When a previous call installed the subscriber this is that call's
    /// format, which may differ from the configuration passed later.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Whether this call installed the subscriber.
    #[must_use]
    pub const fn installed_now(&self) -> bool {
        self.installed_now
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid `EnvFilter` directive.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another subscriber was already registered globally.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber described by `config`, once per process.
///
/// An indicator server may be bootstrapped repeatedly in one process (tests
/// do this). Only the first call installs anything; later calls report the
/// subscriber already in place through [`TelemetryHandle::installed_now`].
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable `log_filter` and
/// [`TelemetryError::Subscriber`] when some other subscriber already owns
/// the global slot.
///
/// # Examples
///
/// ```rust
/// use barlink_config::Config;
/// use barlink_server::telemetry;
///
/// # fn main() -> Result<(), barlink_server::telemetry::TelemetryError> {
/// let config = Config::default();
/// telemetry::initialise(&config)?;
/// let again = telemetry::initialise(&config)?;
/// assert!(!again.installed_now());
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let mut installed_now = false;
    let format = INSTALLED_FORMAT.get_or_try_init(|| {
        install_subscriber(config)?;
        installed_now = true;
        Ok::<_, TelemetryError>(config.log_format())
    })?;
    Ok(TelemetryHandle {
        format: *format,
        installed_now,
    })
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    // Connection threads are named `barlink-conn-<peer>`, so thread names
    // identify the connection an event belongs to.
    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
