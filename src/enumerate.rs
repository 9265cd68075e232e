//! Enumeration of constant-shape specialization cases.

use crate::feasibility::AxisClass;
use crate::shape::OperandDescriptor;

/// Concrete shape of each operand in one constant case.
pub type ConstShapes = Vec<Vec<usize>>;

/// Flat storage for in-progress cases.
///
/// Each row holds the sizes of every operand for one case, with operand `i`
/// occupying `ndim` consecutive entries starting at `i * ndim`.
struct CaseArena {
    data: Vec<usize>,
    rows: usize,
    n_operands: usize,
    ndim: usize,
}

impl CaseArena {
    fn new(n_operands: usize, ndim: usize) -> CaseArena {
        CaseArena {
            data: Vec::new(),
            rows: 0,
            n_operands,
            ndim,
        }
    }

    fn stride(&self) -> usize {
        self.n_operands * self.ndim
    }

    /// Allocate a new zero-filled row and return its index.
    fn alloc(&mut self) -> usize {
        self.data.resize(self.data.len() + self.stride(), 0);
        self.rows += 1;
        self.rows - 1
    }

    /// Copy an existing row into a new row and return its index.
    fn fork(&mut self, row: usize) -> usize {
        let start = row * self.stride();
        self.data.extend_from_within(start..start + self.stride());
        self.rows += 1;
        self.rows - 1
    }

    fn set(&mut self, row: usize, operand: usize, axis: usize, size: usize) {
        let stride = self.stride();
        self.data[row * stride + operand * self.ndim + axis] = size;
    }

    fn shapes(&self, row: usize) -> ConstShapes {
        (0..self.n_operands)
            .map(|op| {
                let start = row * self.stride() + op * self.ndim;
                self.data[start..start + self.ndim].to_vec()
            })
            .collect()
    }
}

/// Enumerate constant shapes for `n_operands` rank-aligned operands whose
/// axes have been classified by [`Feasibility`](crate::feasibility::Feasibility).
///
/// Each [`AxisClass::AmbiguousBroadcast`] axis splits every case into two: one
/// where the dynamic operands are broadcast (size 1) and one where they match
/// the target size. Cases are returned in depth-first order with the
/// broadcast branch first, so `2^k` cases are returned for `k` ambiguous axes.
///
/// Returns `None` if any axis is [`AxisClass::Infeasible`].
pub fn enumerate_broadcast_cases(
    n_operands: usize,
    axes: &[AxisClass],
) -> Option<Vec<ConstShapes>> {
    let ndim = axes.len();
    let mut arena = CaseArena::new(n_operands, ndim);

    // Worklist of (row, next axis to fill).
    let mut stack = vec![(arena.alloc(), 0)];
    let mut done = Vec::new();

    while let Some((row, axis)) = stack.pop() {
        let Some(class) = axes.get(axis) else {
            done.push(row);
            continue;
        };

        match class {
            AxisClass::AllFixed(size) => {
                for op in 0..n_operands {
                    arena.set(row, op, axis, *size);
                }
            }
            AxisClass::ResolvedBroadcast(sizes) => {
                for (op, &size) in sizes.iter().enumerate() {
                    arena.set(row, op, axis, size);
                }
            }
            AxisClass::AmbiguousBroadcast { target, sizes } => {
                let no_broadcast = arena.fork(row);
                for (op, size) in sizes.iter().enumerate() {
                    arena.set(row, op, axis, size.unwrap_or(1));
                    arena.set(no_broadcast, op, axis, size.unwrap_or(*target));
                }
                // Pushed first so the broadcast branch is finished first.
                stack.push((no_broadcast, axis + 1));
            }
            AxisClass::Infeasible => return None,
        }
        stack.push((row, axis + 1));
    }

    Some(done.into_iter().map(|row| arena.shapes(row)).collect())
}

/// Return the shape of each operand if every operand has a fixed shape.
///
/// Sizes are not unified across operands.
pub fn fixed_shapes(operands: &[OperandDescriptor]) -> Option<ConstShapes> {
    operands
        .iter()
        .map(|op| {
            if !op.is_fixed() {
                return None;
            }
            op.shape().iter().map(|d| d.as_fixed()).collect()
        })
        .collect()
}
