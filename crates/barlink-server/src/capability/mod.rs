//! Per-connection indicator capabilities.
//!
//! A capability consumes one data row at a time and produces the indicator
//! value for it. Instances are created at handshake and dropped when the
//! connection closes, so any state they keep is private to one session.

mod collector;
mod errors;
mod predictor;

use barlink_protocol::Field;

pub use self::collector::{Collector, CollectorFactory, CsvRowSink, RowSink};
pub use self::errors::{CapabilityError, WindowMismatch};
pub use self::predictor::{Predictor, PredictorFactory};

/// Stateful handler for the data rows of one connection.
pub trait IndicatorCapability: Send {
    /// Short label used in logs.
    fn kind(&self) -> &'static str;

    /// Processes one row and returns the value to send back.
    ///
    /// Errors are row-level: the connection stays open and the next row is
    /// processed normally.
    fn consume(&mut self, fields: &[Field]) -> Result<f64, CapabilityError>;
}
