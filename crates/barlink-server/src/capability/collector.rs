//! Collector capability: records incoming rows for later training.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use barlink_config::WorkPaths;
use barlink_protocol::Field;
use tracing::debug;

use super::{CapabilityError, IndicatorCapability};
use crate::observer::Link;
use crate::registry::IndicatorFactory;

const COLLECTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::collector");

/// Destination for collected rows.
pub trait RowSink: Send {
    /// Appends one row durably before returning.
    fn append(&mut self, fields: &[Field]) -> Result<(), CapabilityError>;
}

/// Appends rows to a CSV file, creating it on the first row.
#[derive(Debug)]
pub struct CsvRowSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvRowSink {
    /// Creates a sink for `path`; nothing is written until a row arrives.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// Target file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>, CapabilityError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let writer = csv::WriterBuilder::new()
                    .flexible(true)
                    .has_headers(false)
                    .from_path(&self.path)
                    .map_err(|source| self.sink_error(source))?;
                debug!(
                    target: COLLECTOR_TARGET,
                    path = %self.path.display(),
                    "opened collection file"
                );
                writer
            }
        };
        Ok(self.writer.insert(writer))
    }

    fn sink_error(&self, source: csv::Error) -> CapabilityError {
        CapabilityError::Sink {
            path: self.path.clone(),
            source,
        }
    }
}

impl RowSink for CsvRowSink {
    fn append(&mut self, fields: &[Field]) -> Result<(), CapabilityError> {
        let record: Vec<String> = fields.iter().map(ToString::to_string).collect();
        let writer = self.writer()?;
        let written = writer.write_record(&record);
        let flushed = written.and_then(|()| writer.flush().map_err(csv::Error::from));
        flushed.map_err(|source| self.sink_error(source))
    }
}

/// Records every row and answers with `0.0`.
#[derive(Debug)]
pub struct Collector<S> {
    sink: S,
    rows: u64,
}

impl<S: RowSink> Collector<S> {
    /// Wraps `sink`.
    pub const fn new(sink: S) -> Self {
        Self { sink, rows: 0 }
    }

    /// Rows recorded so far.
    pub const fn rows(&self) -> u64 {
        self.rows
    }
}

impl<S: RowSink> IndicatorCapability for Collector<S> {
    fn kind(&self) -> &'static str {
        "collector"
    }

    fn consume(&mut self, fields: &[Field]) -> Result<f64, CapabilityError> {
        self.sink.append(fields)?;
        self.rows += 1;
        Ok(0.0)
    }
}

/// Creates one CSV-backed collector per connection inside the work directory.
#[derive(Debug, Clone)]
pub struct CollectorFactory {
    paths: WorkPaths,
}

impl CollectorFactory {
    /// Builds a factory writing into the work directory of `paths`.
    #[must_use]
    pub const fn new(paths: WorkPaths) -> Self {
        Self { paths }
    }
}

impl IndicatorFactory for CollectorFactory {
    fn create(&self, link: &Link) -> Box<dyn IndicatorCapability> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let path = self.paths.collection_file(stamp, link.id());
        Box::new(Collector::new(CsvRowSink::new(path)))
    }
}
