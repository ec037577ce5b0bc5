//! Predictor capability: evaluates the shared model on each row.

use std::collections::VecDeque;

use barlink_protocol::Field;

use super::{CapabilityError, IndicatorCapability, WindowMismatch};
use crate::model::ModelHandle;
use crate::observer::Link;
use crate::registry::IndicatorFactory;

/// Runs the model over the last `window` rows of one connection.
///
/// With a window of one each row is fed to the model directly. Larger
/// windows concatenate the most recent rows, oldest first, and report
/// [`CapabilityError::WindowFilling`] until enough rows have arrived.
pub struct Predictor {
    model: ModelHandle,
    window: usize,
    row_width: usize,
    history: VecDeque<Vec<f64>>,
}

impl Predictor {
    /// Predictor that feeds each row straight to the model.
    #[must_use]
    pub fn new(model: ModelHandle) -> Self {
        let row_width = model.input_width();
        Self::from_parts(model, 1, row_width)
    }

    /// Predictor over a rolling window of `window` rows.
    ///
    /// # Errors
    ///
    /// Returns [`WindowMismatch`] when the model width is not a multiple of
    /// `window`.
    pub fn with_window(model: ModelHandle, window: usize) -> Result<Self, WindowMismatch> {
        let row_width = row_width(&model, window)?;
        Ok(Self::from_parts(model, window.max(1), row_width))
    }

    fn from_parts(model: ModelHandle, window: usize, row_width: usize) -> Self {
        Self {
            model,
            window,
            row_width,
            history: VecDeque::with_capacity(window),
        }
    }

    /// Fields expected in every row.
    #[must_use]
    pub const fn row_width(&self) -> usize {
        self.row_width
    }

    fn numeric_row(&self, fields: &[Field]) -> Result<Vec<f64>, CapabilityError> {
        if fields.len() != self.row_width {
            return Err(CapabilityError::ShapeMismatch {
                expected: self.row_width,
                actual: fields.len(),
            });
        }
        fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                field
                    .as_number()
                    .ok_or(CapabilityError::NonNumericField { index })
            })
            .collect()
    }
}

impl IndicatorCapability for Predictor {
    fn kind(&self) -> &'static str {
        "predictor"
    }

    fn consume(&mut self, fields: &[Field]) -> Result<f64, CapabilityError> {
        let row = self.numeric_row(fields)?;
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(row);
        if self.history.len() < self.window {
            return Err(CapabilityError::WindowFilling {
                seen: self.history.len(),
                required: self.window,
            });
        }

        let input: Vec<f64> = self.history.iter().flatten().copied().collect();
        let value = self.model.predict(&input);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(CapabilityError::NonFiniteOutput)
        }
    }
}

/// Hands every connection a fresh [`Predictor`] over the shared model.
#[derive(Clone)]
pub struct PredictorFactory {
    model: ModelHandle,
    window: usize,
    row_width: usize,
}

impl PredictorFactory {
    /// Validates the window against the model once, up front.
    ///
    /// # Errors
    ///
    /// Returns [`WindowMismatch`] when the model width is not a multiple of
    /// `window`.
    pub fn new(model: ModelHandle, window: usize) -> Result<Self, WindowMismatch> {
        let row_width = row_width(&model, window)?;
        Ok(Self {
            model,
            window: window.max(1),
            row_width,
        })
    }
}

impl IndicatorFactory for PredictorFactory {
    fn create(&self, _link: &Link) -> Box<dyn IndicatorCapability> {
        Box::new(Predictor::from_parts(
            self.model.clone(),
            self.window,
            self.row_width,
        ))
    }
}

fn row_width(model: &ModelHandle, window: usize) -> Result<usize, WindowMismatch> {
    let width = model.input_width();
    let window = window.max(1);
    if width % window != 0 {
        return Err(WindowMismatch { width, window });
    }
    Ok(width / window)
}
