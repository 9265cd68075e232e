//! Shape descriptors for operator inputs whose sizes may only be known at
//! run time.

use std::fmt;

use smallvec::SmallVec;

/// Inclusive range of sizes a dimension may take at run time.
///
/// `max` is `None` if the dimension has no known upper bound.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SizeRange {
    min: usize,
    max: Option<usize>,
}

impl SizeRange {
    /// Range containing only `size`.
    pub const fn fixed(size: usize) -> SizeRange {
        SizeRange {
            min: size,
            max: Some(size),
        }
    }

    /// Range of sizes `>= min` with no upper bound.
    pub const fn at_least(min: usize) -> SizeRange {
        SizeRange { min, max: None }
    }

    /// Range of sizes in `[min, max]`, or `None` if `max < min`.
    pub fn between(min: usize, max: usize) -> Option<SizeRange> {
        (max >= min).then_some(SizeRange {
            min,
            max: Some(max),
        })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Return true if `size` lies within this range.
    pub fn contains(&self, size: usize) -> bool {
        size >= self.min && self.max.is_none_or(|max| size <= max)
    }

    /// Return true if there is at least one size in both `self` and `other`.
    pub fn overlaps(&self, other: &SizeRange) -> bool {
        let lower = self.min.max(other.min);
        match (self.max, other.max) {
            (Some(a), Some(b)) => lower <= a.min(b),
            (Some(max), None) | (None, Some(max)) => lower <= max,
            (None, None) => true,
        }
    }

    /// Return the single size in this range, if it contains exactly one.
    pub fn as_fixed(&self) -> Option<usize> {
        (self.max == Some(self.min)).then_some(self.min)
    }
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}, {}]", self.min, max),
            None => write!(f, "[{}, inf)", self.min),
        }
    }
}

/// Size of one dimension of an operand, as known when kernels are generated.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Dimension {
    /// Size is the same for all run-time instances.
    Fixed(usize),

    /// Size varies at run time within a range.
    Dynamic(SizeRange),

    /// The operand's rank is not known. A shape containing this is
    /// normalized to contain only this dimension.
    UnknownRank,
}

impl Dimension {
    /// A dynamic dimension of any size `>= min`.
    pub const fn at_least(min: usize) -> Dimension {
        Dimension::Dynamic(SizeRange::at_least(min))
    }

    /// A dynamic dimension with size in `[min, max]`, or `None` if the range
    /// is empty.
    pub fn between(min: usize, max: usize) -> Option<Dimension> {
        SizeRange::between(min, max).map(Dimension::Dynamic)
    }

    pub fn is_unknown_rank(&self) -> bool {
        matches!(self, Dimension::UnknownRank)
    }

    /// Return true if the size of this dimension is not a single known value.
    pub fn is_dynamic(&self) -> bool {
        self.as_fixed().is_none()
    }

    /// Return the size of this dimension if it has exactly one possible value.
    ///
    /// This treats a dynamic dimension whose range contains one size as
    /// fixed.
    pub fn as_fixed(&self) -> Option<usize> {
        match self {
            Dimension::Fixed(size) => Some(*size),
            Dimension::Dynamic(range) => range.as_fixed(),
            Dimension::UnknownRank => None,
        }
    }

    /// Return the range of sizes this dimension may take, or `None` for
    /// [`Dimension::UnknownRank`].
    pub fn range(&self) -> Option<SizeRange> {
        match self {
            Dimension::Fixed(size) => Some(SizeRange::fixed(*size)),
            Dimension::Dynamic(range) => Some(*range),
            Dimension::UnknownRank => None,
        }
    }

    /// Return true if this dimension may have size `size` at run time.
    pub fn admits(&self, size: usize) -> bool {
        self.range().is_none_or(|range| range.contains(size))
    }
}

impl From<usize> for Dimension {
    fn from(size: usize) -> Dimension {
        Dimension::Fixed(size)
    }
}

impl From<SizeRange> for Dimension {
    fn from(range: SizeRange) -> Dimension {
        Dimension::Dynamic(range)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Fixed(size) => write!(f, "{}", size),
            Dimension::Dynamic(range) => write!(f, "{}", range),
            Dimension::UnknownRank => write!(f, "..."),
        }
    }
}

/// Dimension list for an operand. Most operator inputs have few dims.
pub type DimVec = SmallVec<[Dimension; 5]>;

/// Role of an operand in a classification call.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OperandKind {
    /// A data tensor.
    #[default]
    Tensor,

    /// A vector listing the axes a reduction is applied over.
    Axes,
}

/// Shape and metadata for one operator input.
#[derive(Clone, Debug, PartialEq)]
pub struct OperandDescriptor {
    shape: DimVec,
    kind: OperandKind,

    /// Values of an axes operand, if they are known when kernels are
    /// generated.
    const_axes: Option<Vec<i32>>,
}

impl OperandDescriptor {
    /// Create a data operand with a given shape.
    ///
    /// If any dimension is [`Dimension::UnknownRank`], the whole shape is
    /// replaced by that single dimension.
    pub fn new<D: Into<Dimension>>(shape: impl IntoIterator<Item = D>) -> OperandDescriptor {
        let mut shape: DimVec = shape.into_iter().map(|d| d.into()).collect();
        if shape.iter().any(|d| d.is_unknown_rank()) {
            shape = [Dimension::UnknownRank].into_iter().collect();
        }
        OperandDescriptor {
            shape,
            kind: OperandKind::Tensor,
            const_axes: None,
        }
    }

    /// Create a data operand with unknown rank.
    pub fn unknown_rank() -> OperandDescriptor {
        Self::new([Dimension::UnknownRank])
    }

    /// Create a data operand where every dimension is fixed.
    pub fn fixed(shape: &[usize]) -> OperandDescriptor {
        Self::new(shape.iter().copied())
    }

    /// Create an axes operand for a reduction whose values are not known
    /// ahead of time.
    pub fn axes<D: Into<Dimension>>(shape: impl IntoIterator<Item = D>) -> OperandDescriptor {
        OperandDescriptor {
            kind: OperandKind::Axes,
            ..Self::new(shape)
        }
    }

    /// Create an axes operand for a reduction with known axis values.
    pub fn const_axes(axes: &[i32]) -> OperandDescriptor {
        OperandDescriptor {
            kind: OperandKind::Axes,
            const_axes: Some(axes.to_vec()),
            ..Self::fixed(&[axes.len()])
        }
    }

    pub fn shape(&self) -> &[Dimension] {
        &self.shape
    }

    pub fn kind(&self) -> OperandKind {
        self.kind
    }

    pub fn const_axes_values(&self) -> Option<&[i32]> {
        self.const_axes.as_deref()
    }

    /// Return the number of dimensions, or `None` if the rank is unknown.
    pub fn ndim(&self) -> Option<usize> {
        if self.is_unknown_rank() {
            None
        } else {
            Some(self.shape.len())
        }
    }

    pub fn is_unknown_rank(&self) -> bool {
        matches!(self.shape.as_slice(), [Dimension::UnknownRank])
    }

    /// Return true if every dimension has a single known size.
    pub fn is_fixed(&self) -> bool {
        !self.is_unknown_rank() && self.shape.iter().all(|d| !d.is_dynamic())
    }

    /// Return true if a run-time tensor with shape `shape` is consistent
    /// with this descriptor.
    pub fn admits(&self, shape: &[usize]) -> bool {
        if self.is_unknown_rank() {
            return true;
        }
        self.shape.len() == shape.len()
            && self
                .shape
                .iter()
                .zip(shape)
                .all(|(dim, &size)| dim.admits(size))
    }

    /// Return true if any dimension of this operand may be zero at run time.
    pub fn may_be_empty(&self) -> bool {
        self.shape.iter().any(|d| d.admits(0))
    }
}

/// Role of one axis in a symbolic specialization case.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AxisRole {
    /// Size is the same in every operand.
    Common,

    /// Size is 1 in at least one operand and may differ in others.
    Broadcast,

    /// Axis is eliminated by a reduction.
    Reduce,
}

impl AxisRole {
    fn symbol(self) -> char {
        match self {
            AxisRole::Common => 'C',
            AxisRole::Broadcast => 'B',
            AxisRole::Reduce => 'R',
        }
    }
}

/// Ordered sequence of axis roles describing a symbolic specialization case.
///
/// The length of a pattern is the rank of the case's shapes.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Pattern(SmallVec<[AxisRole; 8]>);

impl Pattern {
    pub fn new(roles: &[AxisRole]) -> Pattern {
        Pattern(SmallVec::from_slice(roles))
    }

    pub fn roles(&self) -> &[AxisRole] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indices of the [`AxisRole::Reduce`] axes in this pattern.
    pub fn reduce_axes(&self) -> SmallVec<[usize; 4]> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, role)| **role == AxisRole::Reduce)
            .map(|(i, _)| i)
            .collect()
    }
}

impl FromIterator<AxisRole> for Pattern {
    fn from_iter<I: IntoIterator<Item = AxisRole>>(iter: I) -> Pattern {
        Pattern(iter.into_iter().collect())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, role) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", role.symbol())?;
        }
        write!(f, "]")
    }
}
