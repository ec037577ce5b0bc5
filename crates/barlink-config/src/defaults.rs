/// Default bind address; trading platforms normally run on the same host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port the indicator server listens on.
pub const DEFAULT_PORT: u16 = 5128;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Indicator name registered when none is configured.
pub const DEFAULT_INDICATOR_NAME: &str = "MYIND";

/// Model file written by training and read by `run`.
pub const DEFAULT_MODEL_FILE: &str = "indicator-model.json";

/// Rows per model input vector.
pub const DEFAULT_INPUT_WINDOW: usize = 1;

/// Concurrent connection limit.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Idle bound between accept and the first data row.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 30_000;

/// Drain deadline applied by `stop`.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Lifecycle events buffered per observer.
pub const DEFAULT_OBSERVER_QUEUE_CAPACITY: usize = 256;

/// Largest accepted protocol frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Owned default bind address.
#[must_use]
pub fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

/// Owned default indicator name.
#[must_use]
pub fn default_indicator_name() -> String {
    DEFAULT_INDICATOR_NAME.to_owned()
}

/// Owned default model file name.
#[must_use]
pub fn default_model_file() -> String {
    DEFAULT_MODEL_FILE.to_owned()
}
