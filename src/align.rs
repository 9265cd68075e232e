use std::iter::repeat_n;

use crate::shape::{DimVec, Dimension, OperandDescriptor};

/// Pad operand shapes to a common rank by prepending size-1 dimensions,
/// following the usual right-aligned broadcasting rules.
///
/// The target rank is the largest known rank. Operands of unknown rank are
/// returned unchanged.
pub fn align_ranks(operands: &[OperandDescriptor]) -> Vec<DimVec> {
    let ndim = operands.iter().filter_map(|op| op.ndim()).max().unwrap_or(0);

    operands
        .iter()
        .map(|op| match op.ndim() {
            Some(op_ndim) => repeat_n(Dimension::Fixed(1), ndim - op_ndim)
                .chain(op.shape().iter().copied())
                .collect(),
            None => op.shape().iter().copied().collect(),
        })
        .collect()
}

/// Left-pad a run-time shape with 1s to `ndim` dims.
///
/// Returns `None` if `shape` already has more than `ndim` dims.
pub(crate) fn pad_shape(shape: &[usize], ndim: usize) -> Option<Vec<usize>> {
    let pad = ndim.checked_sub(shape.len())?;
    Some(repeat_n(1, pad).chain(shape.iter().copied()).collect())
}
