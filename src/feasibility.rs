//! Decide whether broadcasting operands can be specialized into a finite set
//! of constant shapes.

use smallvec::SmallVec;

use crate::shape::{DimVec, Dimension};

/// Maximum rank for which constant shapes are enumerated.
///
/// Each ambiguous axis doubles the number of constant cases, so this bounds
/// enumeration to `2^DIVIDE_AXIS_LIMIT` cases.
pub const DIVIDE_AXIS_LIMIT: usize = 5;

/// Per-operand sizes at one axis.
pub type AxisSizes = SmallVec<[usize; 2]>;

/// Classification of one axis of a set of rank-aligned operands.
#[derive(Clone, Debug, PartialEq)]
pub enum AxisClass {
    /// Every operand has the same fixed size.
    AllFixed(usize),

    /// Sizes are fixed but some operands have size 1 and are broadcast
    /// against the others. No branching is needed.
    ResolvedBroadcast(AxisSizes),

    /// At least one operand is dynamic and may be either 1 (broadcast) or
    /// `target` (no broadcast) at run time.
    AmbiguousBroadcast {
        target: usize,

        /// Fixed size of each operand, or `None` for the dynamic operands
        /// whose size depends on the branch taken.
        sizes: SmallVec<[Option<usize>; 2]>,
    },

    /// No finite set of constant sizes covers this axis.
    Infeasible,
}

impl AxisClass {
    fn from_fixed(sizes: AxisSizes) -> AxisClass {
        match sizes.first() {
            Some(&first) if sizes.iter().all(|&s| s == first) => AxisClass::AllFixed(first),
            _ => AxisClass::ResolvedBroadcast(sizes),
        }
    }
}

/// Classify the dimensions of each operand at one axis.
///
/// A dynamic dimension can only branch against a fixed non-unit size. A
/// size-1 dimension against a dynamic one has no single target, so the axis
/// is infeasible and the operands get symbolic cases.
fn classify_axis(dims: &[Dimension]) -> AxisClass {
    if dims.iter().any(|d| d.is_unknown_rank()) {
        return AxisClass::Infeasible;
    }

    // The size of the axis where no broadcasting happens. All non-unit fixed
    // sizes must agree for execution to succeed.
    let mut target = None;
    for size in dims.iter().filter_map(|d| d.as_fixed()) {
        if size == 1 {
            continue;
        }
        match target {
            None => target = Some(size),
            Some(t) if t != size => return AxisClass::Infeasible,
            Some(_) => {}
        }
    }

    let mut sizes: SmallVec<[Option<usize>; 2]> = dims.iter().map(|d| d.as_fixed()).collect();
    if sizes.iter().all(|s| s.is_some()) {
        return AxisClass::from_fixed(sizes.into_iter().flatten().collect());
    }

    // A dynamic size can only be broadcast against a known target.
    let Some(target) = target else {
        return AxisClass::Infeasible;
    };

    let mut ambiguous = false;
    for (size, dim) in sizes.iter_mut().zip(dims) {
        if size.is_some() {
            continue;
        }
        let Some(range) = dim.range() else {
            return AxisClass::Infeasible;
        };
        match (range.contains(1), range.contains(target)) {
            (true, true) => ambiguous = true,
            (true, false) => *size = Some(1),
            (false, true) => *size = Some(target),
            (false, false) => return AxisClass::Infeasible,
        }
    }

    if ambiguous {
        AxisClass::AmbiguousBroadcast { target, sizes }
    } else {
        AxisClass::from_fixed(sizes.into_iter().flatten().collect())
    }
}

/// Result of constant-feasibility analysis of rank-aligned operands.
#[derive(Clone, Debug, PartialEq)]
pub struct Feasibility {
    /// True if constant enumeration covers every run-time shape.
    pub feasible: bool,

    /// Classification of each axis. This is empty if any operand has
    /// unknown rank.
    pub axes: Vec<AxisClass>,
}

impl Feasibility {
    /// Analyze operand shapes which have been aligned to a common rank by
    /// [`align_ranks`](crate::align::align_ranks).
    pub fn analyze(aligned: &[DimVec]) -> Feasibility {
        let unknown_rank = aligned
            .iter()
            .any(|shape| shape.iter().any(|d| d.is_unknown_rank()));
        if unknown_rank || aligned.is_empty() {
            return Feasibility {
                feasible: false,
                axes: Vec::new(),
            };
        }

        let ndim = aligned[0].len();
        let axes: Vec<AxisClass> = (0..ndim)
            .map(|axis| {
                let dims: DimVec = aligned.iter().map(|shape| shape[axis]).collect();
                classify_axis(&dims)
            })
            .collect();

        let feasible =
            ndim <= DIVIDE_AXIS_LIMIT && !axes.iter().any(|a| *a == AxisClass::Infeasible);

        Feasibility { feasible, axes }
    }

    /// Return the number of axes which require branching.
    pub fn ambiguous_axes(&self) -> usize {
        self.axes
            .iter()
            .filter(|a| matches!(a, AxisClass::AmbiguousBroadcast { .. }))
            .count()
    }
}
