//! Test configuration loaders and work directories.

use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use barlink_config::{Config, ListenEndpoint};

use crate::bootstrap::ConfigLoader;
use crate::model::{JsonModelStore, LinearModel, ModelStore};

/// Loader that binds an ephemeral loopback port and drains quickly.
#[derive(Debug, Clone)]
pub struct TestConfigLoader {
    config: Config,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let endpoint = ListenEndpoint::ephemeral_loopback();
        Self {
            config: Config {
                host: endpoint.host,
                port: endpoint.port,
                drain_timeout_ms: 2_000,
                ..Config::default()
            },
        }
    }

    /// Overrides the rolling input window.
    #[must_use]
    pub fn with_input_window(mut self, window: usize) -> Self {
        self.config.input_window = window;
        self
    }

    /// The configuration this loader hands out.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Default for TestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("barlink"),
            OsString::from("--port"),
            OsString::from("not-a-port"),
        ];
        Config::load_from_iter(args)
    }
}

/// Creates an empty work directory.
#[must_use]
pub fn work_dir() -> TempDir {
    TempDir::new().expect("failed to create temporary work directory")
}

/// Writes a `sum` model of `width` inputs where `config` expects it.
pub fn write_sum_model(dir: &Path, config: &Config, width: usize) {
    JsonModelStore
        .save(&dir.join(&config.model_file), &LinearModel::sum(width))
        .expect("write model");
}

/// Writes an unreadable model where `config` expects it.
pub fn write_corrupt_model(dir: &Path, config: &Config) {
    fs::write(dir.join(&config.model_file), b"{ not json").expect("write corrupt model");
}
