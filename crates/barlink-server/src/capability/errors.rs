//! Error types raised while consuming data rows.

use std::path::PathBuf;

use barlink_protocol::ErrorCode;
use thiserror::Error;

/// Row-level failures reported back to the peer.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The row does not have the number of fields the model expects.
    #[error("expected {expected} fields but received {actual}")]
    ShapeMismatch {
        /// Fields per row the capability accepts.
        expected: usize,
        /// Fields present in the row.
        actual: usize,
    },
    /// A field could not be used as a number.
    #[error("field {index} is not numeric")]
    NonNumericField {
        /// Zero-based field position.
        index: usize,
    },
    /// The model produced NaN or an infinity.
    #[error("model produced a non-finite value")]
    NonFiniteOutput,
    /// The rolling input window is not full yet.
    #[error("input window holds {seen} of {required} rows")]
    WindowFilling {
        /// Rows received so far.
        seen: usize,
        /// Rows needed before a prediction is possible.
        required: usize,
    },
    /// The collection sink rejected the row.
    #[error("failed to record row to '{path}': {source}")]
    Sink {
        /// Sink file path.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },
}

impl CapabilityError {
    /// Wire code reported to the peer for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ShapeMismatch { .. } => ErrorCode::ShapeMismatch,
            Self::NonNumericField { .. } => ErrorCode::NonNumericField,
            Self::NonFiniteOutput => ErrorCode::NonFiniteOutput,
            Self::WindowFilling { .. } => ErrorCode::WindowFilling,
            Self::Sink { .. } => ErrorCode::SinkFailure,
        }
    }
}

/// The model width cannot be split evenly into the configured window.
#[derive(Debug, Error)]
#[error("model width {width} is not divisible by input window {window}")]
pub struct WindowMismatch {
    /// Inputs the model expects.
    pub width: usize,
    /// Configured number of rows per prediction.
    pub window: usize,
}
