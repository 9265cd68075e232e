//! rten-specialize classifies operator input shapes into specialization
//! cases for ahead-of-time kernel generation.
//!
//! When kernels are compiled ahead of time, operand shapes are often only
//! partly known. Some dimensions are fixed, others are dynamic with a range
//! of possible sizes, and sometimes even the rank is unknown. Compiling one
//! generic kernel for every shape is slow, while compiling one kernel per
//! possible shape is impossible. This crate picks a small, ordered set of
//! shape templates in between, such that every run-time shape matches at
//! least one of them.
//!
//! # Classifying operands
//!
//! 1. Describe each operand with an [`OperandDescriptor`].
//! 2. Call [`classify`] with the operator's [`ComputeMode`].
//! 3. Generate one kernel per returned [`SpecializationCase`].
//!
//! At run time, pick the first case that matches the actual shapes. The
//! [`CaseTable`] type implements this lookup.
//!
//! ```
//! use rten_specialize::{
//!     classify, CaseKind, ClassifyOptions, ComputeMode, Dimension, OperandDescriptor,
//! };
//!
//! let operands = [
//!     OperandDescriptor::fixed(&[50, 10]),
//!     OperandDescriptor::new([Dimension::at_least(1), Dimension::Fixed(10)]),
//! ];
//! let cases = classify(
//!     &operands,
//!     ComputeMode::ElementwiseBroadcast,
//!     &ClassifyOptions::default(),
//! )
//! .unwrap();
//!
//! // One case where the second operand is broadcast, and one where it is not.
//! assert_eq!(cases.len(), 2);
//! assert!(cases.iter().all(|c| c.kind() == CaseKind::Const));
//! ```
//!
//! # Symbolic cases
//!
//! When shapes cannot be enumerated, cases use a [`Pattern`] of axis roles
//! ([`AxisRole::Common`], [`AxisRole::Broadcast`] or [`AxisRole::Reduce`]).
//! Run-time shapes are matched against a pattern by fusing adjacent axes with
//! the same role, so a small number of patterns covers shapes of any rank.
//!
//! # Configuration
//!
//! [`ClassifyOptions::from_env`] reads options from `RTEN_SPECIALIZE_*`
//! environment variables. Setting `RTEN_SPECIALIZE_VERBOSE=1` logs the cases
//! produced for each call to stderr.
//!
//! # Crate features
//!
//! - `serde` derives `Serialize` for the case types, so case lists can be
//!   written out for kernel packaging tools.

mod align;
mod case;
mod classify;
mod dispatch;
mod enumerate;
mod env;
mod errors;
mod feasibility;
mod patterns;
mod shape;

#[cfg(test)]
mod test_util;

pub use align::align_ranks;
pub use case::{CaseKind, CaseShape, SpecializationCase};
pub use classify::{classify, ClassifyOptions, ComputeMode, DEFAULT_MAX_RANK};
pub use dispatch::CaseTable;
pub use errors::{AxisError, ClassifyError};
pub use feasibility::DIVIDE_AXIS_LIMIT;
pub use patterns::BROADCAST_PATTERNS;
pub use shape::{AxisRole, Dimension, OperandDescriptor, OperandKind, Pattern, SizeRange};
