//! Error types reported by shape classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::classify::ComputeMode;

/// Errors in the axes operand of a reduction.
#[derive(Clone, Debug, PartialEq)]
pub enum AxisError {
    /// A constant axis is outside `[-ndim, ndim)` for the data operand.
    OutOfRange { axis: i32, ndim: usize },

    /// The axes operand is not a scalar or vector, so the number of reduced
    /// axes cannot be determined.
    InvalidAxesRank { ndim: usize },
}

impl Display for AxisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisError::OutOfRange { axis, ndim } => {
                write!(f, "axis {} is out of range for rank {}", axis, ndim)
            }
            AxisError::InvalidAxesRank { ndim } => {
                write!(f, "axes operand must have rank <= 1 but has rank {}", ndim)
            }
        }
    }
}

/// Errors that can occur when classifying operand shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassifyError {
    /// The number of operands is not valid for the computation mode.
    InvalidOperandCount { mode: ComputeMode, count: usize },

    /// The axes operand of a reduction is invalid.
    InvalidAxisSpecification(AxisError),
}

impl Display for ClassifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifyError::InvalidOperandCount { mode, count } => {
                write!(f, "{:?} mode does not accept {} operands", mode, count)
            }
            ClassifyError::InvalidAxisSpecification(err) => {
                write!(f, "invalid reduction axes: {}", err)
            }
        }
    }
}

impl Error for ClassifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClassifyError::InvalidAxisSpecification(err) => Some(err),
            ClassifyError::InvalidOperandCount { .. } => None,
        }
    }
}

impl Error for AxisError {}

impl From<AxisError> for ClassifyError {
    fn from(err: AxisError) -> ClassifyError {
        ClassifyError::InvalidAxisSpecification(err)
    }
}
