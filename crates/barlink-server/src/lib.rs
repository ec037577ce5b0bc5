//! Indicator server for trading-platform plug-ins.
//!
//! A plug-in opens a TCP connection, names the indicator it wants in a
//! handshake, and then streams one data row per bar. The server resolves the
//! name through a fixed registry, creates a fresh capability for the
//! connection, and answers each row with a result or a row-level error.
//!
//! Two capabilities ship with the crate:
//!
//! - a [`Collector`] that appends rows to a CSV file in the work directory so
//!   they can later be used for training;
//! - a [`Predictor`] that feeds rows through a shared, read-only
//!   [`Regression`] model loaded once at start-up.
//!
//! Each connection is served on its own thread with its own state. Observers
//! registered through [`IndicatorServer::add_listener`] are told when a
//! connection becomes active and when it ends, through bounded queues that
//! never block the connection threads.
//!
//! [`run_indicator`] wires everything together for the CLI: bootstrap,
//! serve, and stop gracefully on SIGTERM, SIGINT, SIGQUIT, or SIGHUP.

mod bootstrap;
mod capability;
mod health;
mod model;
mod observer;
mod process;
mod registry;
mod server;
mod session;
pub mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, IndicatorMode, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with,
};
pub use capability::{
    CapabilityError, Collector, CollectorFactory, CsvRowSink, IndicatorCapability, Predictor,
    PredictorFactory, RowSink, WindowMismatch,
};
pub use health::{ServerReporter, StructuredServerReporter};
pub use model::{JsonModelStore, LinearModel, ModelError, ModelHandle, ModelStore, Regression};
pub use observer::{ConnectionObserver, Link, LoggingObserver};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_indicator};
pub use registry::{IndicatorFactory, IndicatorRegistry, RegistryBuilder, RegistryError};
pub use server::{DrainReport, IndicatorServer, RunningServer, ServerError, ServerSettings};
pub use session::{SessionEnd, SessionError};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
