//! Indicator server bootstrap orchestration.
//!
//! Bootstrap loads configuration, initialises telemetry, validates the work
//! directory, and for run mode loads the model. Everything that can fail does
//! so here, before any socket is bound.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use barlink_config::{Config, WorkPaths, WorkPathsError};

use crate::capability::{CollectorFactory, PredictorFactory, WindowMismatch};
use crate::health::ServerReporter;
use crate::model::{ModelError, ModelStore};
use crate::server::{IndicatorServer, ServerError, ServerSettings};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a configuration resolved elsewhere, such as by the
/// CLI.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// What the registered indicator does with incoming rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorMode {
    /// Append every row to a CSV file in the work directory.
    Collect,
    /// Feed rows to the trained model and reply with its predictions.
    Run,
}

impl fmt::Display for IndicatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Collect => "collect",
            Self::Run => "run",
        })
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The work directory is unusable.
    #[error("invalid work directory: {source}")]
    WorkPath {
        /// Underlying path error.
        #[source]
        source: WorkPathsError,
    },
    /// The model required by run mode could not be loaded.
    #[error("failed to load model: {source}")]
    ModelLoad {
        /// Underlying store error.
        #[source]
        source: ModelError,
    },
    /// The configured input window does not fit the model.
    #[error("invalid input window: {source}")]
    Window {
        /// Underlying mismatch.
        #[source]
        source: WindowMismatch,
    },
    /// The indicator could not be registered.
    #[error("failed to register indicator: {source}")]
    Registration {
        /// Underlying server error.
        #[source]
        source: ServerError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Bootstrapped {
    config: Config,
    paths: WorkPaths,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn ServerReporter>,
}

impl Bootstrapped {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Paths derived from the work directory.
    #[must_use]
    pub fn paths(&self) -> &WorkPaths {
        &self.paths
    }

    /// Subscriber that was active when bootstrap completed.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Builds an unstarted server with the configured indicator registered
    /// for `mode`.
    ///
    /// Run mode loads the model from the work directory through `store`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::ModelLoad`] or [`BootstrapError::Window`]
    /// when run mode cannot build a predictor; the failure is also reported.
    pub fn build_server(
        &self,
        mode: IndicatorMode,
        store: &dyn ModelStore,
    ) -> Result<IndicatorServer, BootstrapError> {
        let result = self.try_build_server(mode, store);
        if let Err(error) = &result {
            self.reporter.bootstrap_failed(error);
        }
        result
    }

    fn try_build_server(
        &self,
        mode: IndicatorMode,
        store: &dyn ModelStore,
    ) -> Result<IndicatorServer, BootstrapError> {
        let mut server = IndicatorServer::new(ServerSettings::from_config(&self.config));
        let name = self.config.indicator_name().to_owned();
        let registered = match mode {
            IndicatorMode::Collect => {
                server.add_indicator_factory(name, CollectorFactory::new(self.paths.clone()))
            }
            IndicatorMode::Run => {
                let path = self.paths.model_path();
                let model = store
                    .load(path)
                    .map_err(|source| BootstrapError::ModelLoad { source })?;
                self.reporter.model_loaded(path, model.input_width());
                let factory = PredictorFactory::new(model, self.config.input_window())
                    .map_err(|source| BootstrapError::Window { source })?;
                server.add_indicator_factory(name, factory)
            }
        };
        registered.map_err(|source| BootstrapError::Registration { source })?;
        Ok(server)
    }
}

/// Bootstraps the indicator server using the supplied collaborators.
///
/// # Errors
///
/// Returns a [`BootstrapError`] when configuration, telemetry, or the work
/// directory is unusable. Failures are reported before they are returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn ServerReporter>,
    work_dir: &Path,
) -> Result<Bootstrapped, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let paths = match WorkPaths::from_config(PathBuf::from(work_dir), &config) {
        Ok(paths) => paths,
        Err(source) => {
            let error = BootstrapError::WorkPath { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    reporter.bootstrap_succeeded(&config);
    Ok(Bootstrapped {
        config,
        paths,
        telemetry,
        reporter,
    })
}
