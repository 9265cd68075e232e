//! Specialization cases produced by classification.

use std::fmt;

use smallvec::SmallVec;

use crate::shape::{Dimension, Pattern, SizeRange};

/// Shape template for one operand in a specialization case.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CaseShape {
    /// Shape where every size is known.
    Const(Vec<usize>),

    /// Symbolic shape with one axis per pattern entry and a size range for
    /// each axis.
    Symbolic { pattern: Pattern, ranges: Vec<SizeRange> },

    /// An operand's shape exactly as given in its descriptor.
    Original(Vec<Dimension>),
}

impl CaseShape {
    /// Create a symbolic shape where every axis has the same size range.
    pub(crate) fn symbolic(pattern: Pattern, range: SizeRange) -> CaseShape {
        let ranges = vec![range; pattern.len()];
        CaseShape::Symbolic { pattern, ranges }
    }

    /// Return the rank of this shape, or `None` if it is unknown.
    pub fn ndim(&self) -> Option<usize> {
        match self {
            CaseShape::Const(shape) => Some(shape.len()),
            CaseShape::Symbolic { pattern, .. } => Some(pattern.len()),
            CaseShape::Original(dims) => {
                if dims.iter().any(|d| d.is_unknown_rank()) {
                    None
                } else {
                    Some(dims.len())
                }
            }
        }
    }

    /// Return the range of sizes for each axis, or `None` if the rank is
    /// unknown.
    ///
    /// Together with [`ndim`](CaseShape::ndim) this is the key a kernel
    /// dispatch table uses to look up the case at run time.
    pub fn ranges(&self) -> Option<Vec<SizeRange>> {
        match self {
            CaseShape::Const(shape) => Some(shape.iter().map(|&s| SizeRange::fixed(s)).collect()),
            CaseShape::Symbolic { ranges, .. } => Some(ranges.clone()),
            CaseShape::Original(dims) => dims.iter().map(|d| d.range()).collect(),
        }
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        match self {
            CaseShape::Symbolic { pattern, .. } => Some(pattern),
            CaseShape::Const(_) | CaseShape::Original(_) => None,
        }
    }
}

impl fmt::Display for CaseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseShape::Const(shape) => write!(f, "{:?}", shape),
            CaseShape::Symbolic { pattern, ranges } => {
                write!(f, "{:?} (", pattern)?;
                for (i, range) in ranges.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", range)?;
                }
                write!(f, ")")
            }
            CaseShape::Original(dims) => {
                write!(f, "(")?;
                for (i, dim) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", dim)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// How a specialization case was produced.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CaseKind {
    /// Operands returned unchanged because no specialization was requested.
    PassThrough,

    /// Every operand has a constant shape.
    Const,

    /// Operands have symbolic shapes described by a pattern.
    Symbolic,

    /// Generic case which reproduces the original operand shapes. This
    /// covers shapes that no other case matches.
    Fallback,
}

/// A shape template for every operand, which a kernel generator compiles
/// into one kernel.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SpecializationCase {
    kind: CaseKind,
    operands: Vec<CaseShape>,
    reduce_axes: Option<SmallVec<[usize; 4]>>,
}

impl SpecializationCase {
    pub(crate) fn new(kind: CaseKind, operands: Vec<CaseShape>) -> SpecializationCase {
        SpecializationCase {
            kind,
            operands,
            reduce_axes: None,
        }
    }

    pub(crate) fn with_reduce_axes(mut self, axes: SmallVec<[usize; 4]>) -> SpecializationCase {
        self.reduce_axes = Some(axes);
        self
    }

    pub fn kind(&self) -> CaseKind {
        self.kind
    }

    /// Shape template for each operand, in the order operands were passed
    /// to [`classify`](crate::classify).
    pub fn operands(&self) -> &[CaseShape] {
        &self.operands
    }

    /// For reduction cases, the axes of the data operand's shape which are
    /// reduced.
    pub fn reduce_axes(&self) -> Option<&[usize]> {
        self.reduce_axes.as_deref()
    }

    /// Return the pattern of the first symbolic operand, if any.
    pub fn pattern(&self) -> Option<&Pattern> {
        self.operands.iter().find_map(|op| op.pattern())
    }
}

impl fmt::Display for SpecializationCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        for (i, op) in self.operands.iter().enumerate() {
            let sep = if i == 0 { ": " } else { " x " };
            write!(f, "{}{}", sep, op)?;
        }
        if let Some(axes) = &self.reduce_axes {
            write!(f, " reduce {:?}", axes.as_slice())?;
        }
        Ok(())
    }
}
