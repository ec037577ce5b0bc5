//! Protocol message definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single value within a data row.
///
/// Platforms send prices and volumes as numbers, but instrument names and
/// timestamps may arrive as strings, so both are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    /// Numeric field.
    Number(f64),
    /// Free-form text field.
    Text(String),
}

impl Field {
    /// Returns the numeric value, if this field is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(formatter, "{value}"),
            Self::Text(text) => formatter.write_str(text),
        }
    }
}

/// Machine-readable classification carried by [`Message::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or out-of-sequence message; the connection closes.
    ProtocolViolation,
    /// The handshake named an indicator the server does not offer.
    UnknownIndicator,
    /// The row does not have the width the model expects.
    ShapeMismatch,
    /// A field the model needs as a number was sent as text.
    NonNumericField,
    /// The model produced NaN or an infinite value.
    NonFiniteOutput,
    /// A windowed indicator has not yet seen enough rows.
    WindowFilling,
    /// The collector could not persist the row.
    SinkFailure,
    /// The server is at its connection limit.
    ServerBusy,
}

impl ErrorCode {
    /// Returns the wire spelling of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProtocolViolation => "protocol_violation",
            Self::UnknownIndicator => "unknown_indicator",
            Self::ShapeMismatch => "shape_mismatch",
            Self::NonNumericField => "non_numeric_field",
            Self::NonFiniteOutput => "non_finite_output",
            Self::WindowFilling => "window_filling",
            Self::SinkFailure => "sink_failure",
            Self::ServerBusy => "server_busy",
        }
    }

    /// Returns true when the code terminates the session.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::ProtocolViolation | Self::UnknownIndicator | Self::ServerBusy
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Messages exchanged between the trading platform and the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Opens a session for the named indicator.
    Handshake {
        /// Indicator name advertised by the platform.
        indicator: String,
    },
    /// One bar of input data.
    DataRow {
        /// Ordered field values.
        fields: Vec<Field>,
    },
    /// Indicator value computed for the preceding row.
    Result {
        /// Computed value.
        value: f64,
    },
    /// Failure report for the preceding message.
    Error {
        /// Classification of the failure.
        code: ErrorCode,
        /// Human-readable description.
        reason: String,
    },
    /// Ends the session.
    Close,
}

impl Message {
    /// Builds a handshake message.
    pub fn handshake(indicator: impl Into<String>) -> Self {
        Self::Handshake {
            indicator: indicator.into(),
        }
    }

    /// Builds a data row from numeric values.
    pub fn numeric_row(values: impl IntoIterator<Item = f64>) -> Self {
        Self::DataRow {
            fields: values.into_iter().map(Field::Number).collect(),
        }
    }

    /// Builds an error message.
    pub fn error(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self::Error {
            code,
            reason: reason.into(),
        }
    }

    /// Short name of the message kind, used in logs and diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "handshake",
            Self::DataRow { .. } => "data_row",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
            Self::Close => "close",
        }
    }
}
