//! Selection of the specialization case to use for run-time shapes.
//!
//! Kernel packagers build their own dispatch tables from the ranks and
//! ranges of each case. [`CaseTable`] is a reference implementation of that
//! lookup, which is also what coverage is tested against.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::align::pad_shape;
use crate::case::{CaseKind, CaseShape, SpecializationCase};
use crate::shape::{AxisRole, Dimension, Pattern, SizeRange};

/// Role of a group of adjacent axes in run-time shapes, after fusing.
#[derive(Clone, Debug, PartialEq)]
enum FusedRole {
    Common,

    /// Axes where the operands flagged `true` have size 1 and the others
    /// share a larger size.
    Broadcast(SmallVec<[bool; 4]>),

    Reduce,
}

impl FusedRole {
    fn fits(&self, role: AxisRole) -> bool {
        matches!(
            (self, role),
            (FusedRole::Common, AxisRole::Common)
                | (FusedRole::Broadcast(_), AxisRole::Broadcast)
                | (FusedRole::Reduce, AxisRole::Reduce)
        )
    }
}

/// A run of adjacent axes with the same role.
#[derive(Clone, Debug, PartialEq)]
struct FusedAxis {
    role: FusedRole,

    /// Product of the sizes of the fused axes in the non-broadcast operands.
    size: usize,
}

/// Append an axis to a list of fused axes, merging it with the last axis if
/// they have the same role.
fn push_fused(fused: &mut Vec<FusedAxis>, role: FusedRole, size: usize) {
    match fused.last_mut() {
        Some(last) if last.role == role => last.size = last.size.saturating_mul(size),
        _ => fused.push(FusedAxis { role, size }),
    }
}

/// Fuse the axes of rank-aligned, non-scalar operand shapes.
///
/// Returns `None` if the shapes cannot be broadcast together.
fn fuse_broadcast_axes(shapes: &[Vec<usize>]) -> Option<Vec<FusedAxis>> {
    let ndim = shapes.first().map_or(0, |s| s.len());
    let mut fused = Vec::new();

    for axis in 0..ndim {
        let sizes: SmallVec<[usize; 4]> = shapes.iter().map(|s| s[axis]).collect();
        let mut target = None;
        for &size in sizes.iter().filter(|&&s| s != 1) {
            match target {
                None => target = Some(size),
                Some(t) if t != size => return None,
                Some(_) => {}
            }
        }

        // Axes which are 1 in every operand can be dropped.
        let Some(target) = target else {
            continue;
        };

        let role = if sizes.iter().all(|&s| s == target) {
            FusedRole::Common
        } else {
            FusedRole::Broadcast(sizes.iter().map(|&s| s == 1).collect())
        };
        push_fused(&mut fused, role, target);
    }

    Some(fused)
}

/// Fuse the axes of a reduction input.
///
/// Reducing a size-1 axis is a no-op, so these axes are dropped.
fn fuse_reduce_axes(shape: &[usize], axes: &[usize]) -> Vec<FusedAxis> {
    let mut fused = Vec::new();
    for (axis, &size) in shape.iter().enumerate() {
        if size == 1 {
            continue;
        }
        let role = if axes.contains(&axis) {
            FusedRole::Reduce
        } else {
            FusedRole::Common
        };
        push_fused(&mut fused, role, size);
    }
    fused
}

/// Return true if fused axes can be laid out along a pattern.
///
/// The fused axes must appear in the pattern in order. Pattern axes that are
/// not used are given size 1.
fn embeds_in_pattern(fused: &[FusedAxis], pattern: &Pattern, ranges: &[SizeRange]) -> bool {
    let mut remaining = fused.iter().peekable();

    for (&role, range) in pattern.roles().iter().zip(ranges) {
        let next = remaining.peek();
        let takes_next = next.is_some_and(|axis| {
            let broadcast_ok = !matches!(axis.role, FusedRole::Broadcast(_)) || range.contains(1);
            axis.role.fits(role) && range.contains(axis.size) && broadcast_ok
        });
        if takes_next {
            remaining.next();
        } else if !range.contains(1) {
            return false;
        }
    }

    remaining.peek().is_none()
}

/// Return true if a run-time shape is consistent with the dims of an operand
/// descriptor.
fn dims_admit(dims: &[Dimension], shape: &[usize]) -> bool {
    if let [Dimension::UnknownRank] = dims {
        return true;
    }
    dims.len() == shape.len() && dims.iter().zip(shape).all(|(d, &size)| d.admits(size))
}

fn symbolic_template(case: &SpecializationCase) -> Option<(&Pattern, &[SizeRange])> {
    case.operands().iter().find_map(|op| match op {
        CaseShape::Symbolic { pattern, ranges } => Some((pattern, ranges.as_slice())),
        CaseShape::Const(_) | CaseShape::Original(_) => None,
    })
}

impl SpecializationCase {
    /// Return true if this case can run an elementwise or broadcasting
    /// operation on inputs with the given run-time shapes.
    ///
    /// Reduction cases never match. Use
    /// [`matches_reduce`](SpecializationCase::matches_reduce) for those.
    pub fn matches(&self, shapes: &[&[usize]]) -> bool {
        if shapes.len() != self.operands().len() || self.reduce_axes().is_some() {
            return false;
        }

        match self.kind() {
            CaseKind::Const => self.operands().iter().zip(shapes).all(|(op, shape)| match op {
                CaseShape::Const(expected) => {
                    pad_shape(shape, expected.len()).as_deref() == Some(expected.as_slice())
                }
                CaseShape::Symbolic { .. } | CaseShape::Original(_) => false,
            }),
            CaseKind::PassThrough | CaseKind::Fallback => self.admits_original(shapes),
            CaseKind::Symbolic => {
                let Some((pattern, ranges)) = symbolic_template(self) else {
                    return false;
                };

                // Single-element operands are broadcast as scalars.
                let non_scalar: Vec<&[usize]> = shapes
                    .iter()
                    .copied()
                    .filter(|s| s.iter().product::<usize>() != 1)
                    .collect();
                let ndim = non_scalar.iter().map(|s| s.len()).max().unwrap_or(0);
                let aligned: Option<Vec<Vec<usize>>> =
                    non_scalar.iter().map(|s| pad_shape(s, ndim)).collect();

                aligned
                    .and_then(|aligned| fuse_broadcast_axes(&aligned))
                    .is_some_and(|fused| embeds_in_pattern(&fused, pattern, ranges))
            }
        }
    }

    /// Return true if this case can run a reduction of an input with shape
    /// `data_shape` over `axes`.
    ///
    /// `axes` must be in `[0, data_shape.len())`.
    pub fn matches_reduce(&self, data_shape: &[usize], axes: &[usize]) -> bool {
        match self.kind() {
            CaseKind::PassThrough | CaseKind::Fallback => match self.operands().first() {
                Some(CaseShape::Original(dims)) => dims_admit(dims, data_shape),
                _ => false,
            },
            CaseKind::Symbolic if self.reduce_axes().is_some() => {
                let Some(CaseShape::Symbolic { pattern, ranges }) = self.operands().first() else {
                    return false;
                };
                // Cases without reduced axes only run reductions that list
                // no axes.
                if self.reduce_axes().is_some_and(|r| r.is_empty()) && !axes.is_empty() {
                    return false;
                }
                let fused = fuse_reduce_axes(data_shape, axes);
                embeds_in_pattern(&fused, pattern, ranges)
            }
            CaseKind::Symbolic | CaseKind::Const => false,
        }
    }

    fn admits_original(&self, shapes: &[&[usize]]) -> bool {
        self.operands().iter().zip(shapes).all(|(op, shape)| match op {
            CaseShape::Original(dims) => dims_admit(dims, shape),
            CaseShape::Const(_) | CaseShape::Symbolic { .. } => false,
        })
    }
}

/// Lookup table which selects the highest-priority case for run-time
/// shapes.
pub struct CaseTable<'a> {
    cases: &'a [SpecializationCase],

    /// Indices of constant cases, keyed by the largest operand rank.
    const_cases: FxHashMap<usize, Vec<usize>>,

    /// Indices of all other cases, in priority order.
    generic_cases: Vec<usize>,
}

impl<'a> CaseTable<'a> {
    /// Create a table from cases returned by [`classify`](crate::classify).
    pub fn new(cases: &'a [SpecializationCase]) -> CaseTable<'a> {
        let mut const_cases: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        let mut generic_cases = Vec::new();

        for (i, case) in cases.iter().enumerate() {
            if case.kind() == CaseKind::Const {
                let ndim = case
                    .operands()
                    .iter()
                    .filter_map(|op| op.ndim())
                    .max()
                    .unwrap_or(0);
                const_cases.entry(ndim).or_default().push(i);
            } else {
                generic_cases.push(i);
            }
        }

        CaseTable {
            cases,
            const_cases,
            generic_cases,
        }
    }

    pub fn cases(&self) -> &'a [SpecializationCase] {
        self.cases
    }

    /// Return the index and case to use for an elementwise or broadcasting
    /// operation on inputs with the given shapes, or `None` if no case
    /// matches.
    pub fn select(&self, shapes: &[&[usize]]) -> Option<(usize, &'a SpecializationCase)> {
        let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
        let const_match = self
            .const_cases
            .get(&ndim)
            .and_then(|indices| indices.iter().copied().find(|&i| self.cases[i].matches(shapes)));
        let generic_match = self
            .generic_cases
            .iter()
            .copied()
            .find(|&i| self.cases[i].matches(shapes));

        let index = match (const_match, generic_match) {
            (Some(c), Some(g)) => c.min(g),
            (c, g) => c.or(g)?,
        };
        let cases = self.cases;
        Some((index, &cases[index]))
    }

    /// Return the index and case to use for a reduction of an input with
    /// shape `data_shape` over `axes`, or `None` if no case matches.
    pub fn select_reduce(
        &self,
        data_shape: &[usize],
        axes: &[usize],
    ) -> Option<(usize, &'a SpecializationCase)> {
        let cases = self.cases;
        self.generic_cases
            .iter()
            .copied()
            .find(|&i| cases[i].matches_reduce(data_shape, axes))
            .map(|i| (i, &cases[i]))
    }
}
