//! Model handles and the persistence seam used to load them.
//!
//! The server treats a trained model as an opaque regression: a fixed input
//! width and a pure `predict` function. Handles are loaded once, wrapped in an
//! `Arc`, and shared read-only by every predictor instance.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Read-only inference unit shared across connections.
pub trait Regression: Send + Sync {
    /// Number of inputs `predict` expects.
    fn input_width(&self) -> usize;

    /// Computes the model output for `input`.
    ///
    /// Callers guarantee `input.len() == self.input_width()`.
    fn predict(&self, input: &[f64]) -> f64;
}

/// Shared model handle.
pub type ModelHandle = Arc<dyn Regression>;

/// Affine model `bias + Σ weightᵢ·xᵢ`, the format bundled with the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// One weight per input.
    pub weights: Vec<f64>,
    /// Constant term.
    #[serde(default)]
    pub bias: f64,
}

impl LinearModel {
    /// Builds a model from weights and bias.
    #[must_use]
    pub const fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Model whose output is the plain sum of `width` inputs.
    #[must_use]
    pub fn sum(width: usize) -> Self {
        Self::new(vec![1.0; width], 0.0)
    }
}

impl Regression for LinearModel {
    fn input_width(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, input: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(input)
            .fold(self.bias, |acc, (weight, value)| weight.mul_add(*value, acc))
    }
}

/// Errors raised while loading or saving models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No model exists at the path.
    #[error("no model found at '{path}'")]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },
    /// The file exists but does not describe a usable model.
    #[error("model at '{path}' is corrupt: {reason}")]
    Corrupt {
        /// Requested path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
    /// Reading or writing the file failed.
    #[error("failed to access model file '{path}': {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the model failed.
    #[error("failed to encode model for '{path}': {source}")]
    Encode {
        /// File path.
        path: PathBuf,
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
}

/// Persistence capability keyed by path.
pub trait ModelStore: Send + Sync {
    /// Loads a model handle from `path`.
    fn load(&self, path: &Path) -> Result<ModelHandle, ModelError>;

    /// Persists `model` to `path`, replacing any existing file.
    fn save(&self, path: &Path, model: &LinearModel) -> Result<(), ModelError>;
}

/// Stores [`LinearModel`] values as JSON documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonModelStore;

impl ModelStore for JsonModelStore {
    fn load(&self, path: &Path) -> Result<ModelHandle, ModelError> {
        let file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ModelError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ModelError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let model: LinearModel =
            serde_json::from_reader(BufReader::new(file)).map_err(|error| ModelError::Corrupt {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;
        if model.weights.is_empty() {
            return Err(ModelError::Corrupt {
                path: path.to_path_buf(),
                reason: "model has no weights".to_owned(),
            });
        }
        if !model.bias.is_finite() || model.weights.iter().any(|weight| !weight.is_finite()) {
            return Err(ModelError::Corrupt {
                path: path.to_path_buf(),
                reason: "model contains non-finite parameters".to_owned(),
            });
        }
        Ok(Arc::new(model))
    }

    fn save(&self, path: &Path, model: &LinearModel) -> Result<(), ModelError> {
        let io_error = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, model).map_err(|source| ModelError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_error)
    }
}
