//! Classification of operand shapes into specialization cases.

use smallvec::SmallVec;

use crate::align::align_ranks;
use crate::case::{CaseKind, CaseShape, SpecializationCase};
use crate::enumerate::{enumerate_broadcast_cases, fixed_shapes};
use crate::env::{parse_flag, parse_usize};
use crate::errors::{AxisError, ClassifyError};
use crate::feasibility::Feasibility;
use crate::patterns::{broadcast_patterns, flattened_pattern, reduce_axis_count, reduce_patterns};
use crate::shape::{OperandDescriptor, OperandKind, Pattern, SizeRange};

/// Largest tensor rank supported by default. This is used as the rank of
/// reduction inputs whose rank is unknown.
pub const DEFAULT_MAX_RANK: usize = 8;

/// The kind of computation an operator performs, which determines how its
/// input shapes are specialized.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum ComputeMode {
    /// No specialization. Operands are returned unchanged in a single case.
    None,

    /// Elementwise operation on operands of the same shape.
    Elementwise,

    /// Elementwise operation on two operands whose shapes are broadcast
    /// together.
    ElementwiseBroadcast,

    /// Reduction of the first operand over the axes given by another
    /// operand.
    Reduce,
}

/// Options that control classification.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifyOptions {
    /// Whether the target kernels support broadcasting. If false,
    /// [`ComputeMode::ElementwiseBroadcast`] produces a single flattened case.
    pub broadcast: bool,

    /// Largest rank supported by the target.
    pub max_rank: usize,

    /// Log classification decisions and the cases produced to stderr.
    pub verbose: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        ClassifyOptions {
            broadcast: true,
            max_rank: DEFAULT_MAX_RANK,
            verbose: false,
        }
    }
}

impl ClassifyOptions {
    /// Return the default options with overrides from environment variables.
    ///
    /// - `RTEN_SPECIALIZE_VERBOSE` enables logging
    /// - `RTEN_SPECIALIZE_NO_BROADCAST` disables broadcasting support
    /// - `RTEN_SPECIALIZE_MAX_RANK` sets the maximum rank
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Return the default options with overrides from variables looked up
    /// with `var`.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let flag = |name: &str, default: bool| parse_flag(name, var(name).as_deref(), default);
        let max_rank_var = "RTEN_SPECIALIZE_MAX_RANK";

        ClassifyOptions {
            broadcast: !flag("RTEN_SPECIALIZE_NO_BROADCAST", !default.broadcast),
            max_rank: parse_usize(max_rank_var, var(max_rank_var).as_deref())
                .unwrap_or(default.max_rank),
            verbose: flag("RTEN_SPECIALIZE_VERBOSE", default.verbose),
        }
    }
}

/// Classify operand shapes into an ordered list of specialization cases.
///
/// Each case is a shape template that a kernel generator compiles once. For
/// every combination of run-time shapes permitted by `operands`, at least one
/// returned case matches. Cases are ordered from most to least specific, so
/// a dispatcher should pick the first matching case.
///
/// The result depends only on the inputs, so this can be called concurrently
/// from multiple threads.
pub fn classify(
    operands: &[OperandDescriptor],
    mode: ComputeMode,
    options: &ClassifyOptions,
) -> Result<Vec<SpecializationCase>, ClassifyError> {
    let cases = match mode {
        ComputeMode::None => {
            let shapes = operands
                .iter()
                .map(|op| CaseShape::Original(op.shape().to_vec()))
                .collect();
            vec![SpecializationCase::new(CaseKind::PassThrough, shapes)]
        }
        ComputeMode::Elementwise => classify_elementwise(operands, options)?,
        ComputeMode::ElementwiseBroadcast => classify_broadcast(operands, options)?,
        ComputeMode::Reduce => classify_reduce(operands, options)?,
    };

    if options.verbose {
        let shapes: Vec<String> = operands
            .iter()
            .map(|op| CaseShape::Original(op.shape().to_vec()).to_string())
            .collect();
        eprintln!(
            "classify {:?} {} -> {} cases",
            mode,
            shapes.join(" x "),
            cases.len()
        );
        for (i, case) in cases.iter().enumerate() {
            eprintln!("  #{} {}", i, case);
        }
    }

    Ok(cases)
}

/// Size range used for every axis of a symbolic case.
///
/// Axes are at least 1, unless an operand may be empty.
fn symbolic_range(operands: &[OperandDescriptor]) -> SizeRange {
    if operands.iter().any(|op| op.may_be_empty()) {
        SizeRange::at_least(0)
    } else {
        SizeRange::at_least(1)
    }
}

fn symbolic_case(operands: &[OperandDescriptor], pattern: &Pattern) -> SpecializationCase {
    let range = symbolic_range(operands);
    let shapes = operands
        .iter()
        .map(|_| CaseShape::symbolic(pattern.clone(), range))
        .collect();
    SpecializationCase::new(CaseKind::Symbolic, shapes)
}

fn const_case(shapes: Vec<Vec<usize>>) -> SpecializationCase {
    SpecializationCase::new(
        CaseKind::Const,
        shapes.into_iter().map(CaseShape::Const).collect(),
    )
}

fn classify_elementwise(
    operands: &[OperandDescriptor],
    options: &ClassifyOptions,
) -> Result<Vec<SpecializationCase>, ClassifyError> {
    if operands.is_empty() {
        return Err(ClassifyError::InvalidOperandCount {
            mode: ComputeMode::Elementwise,
            count: 0,
        });
    }

    if let Some(shapes) = fixed_shapes(operands) {
        return Ok(vec![const_case(shapes)]);
    }

    if options.verbose {
        eprintln!("elementwise: flattening dynamic operands");
    }
    Ok(vec![symbolic_case(operands, &flattened_pattern())])
}

fn classify_broadcast(
    operands: &[OperandDescriptor],
    options: &ClassifyOptions,
) -> Result<Vec<SpecializationCase>, ClassifyError> {
    if operands.len() != 2 {
        return Err(ClassifyError::InvalidOperandCount {
            mode: ComputeMode::ElementwiseBroadcast,
            count: operands.len(),
        });
    }

    if !options.broadcast {
        if options.verbose {
            eprintln!("broadcast: not supported by target, flattening operands");
        }
        return Ok(vec![symbolic_case(operands, &flattened_pattern())]);
    }

    let aligned = align_ranks(operands);
    let feasibility = Feasibility::analyze(&aligned);

    if feasibility.feasible {
        let shapes = enumerate_broadcast_cases(operands.len(), &feasibility.axes);

        // Enumeration only fails on infeasible axes, which a feasible
        // analysis excludes.
        debug_assert!(shapes.is_some(), "feasible axes failed to enumerate");

        if let Some(shapes) = shapes {
            if options.verbose {
                eprintln!(
                    "broadcast: enumerating constant shapes with {} ambiguous axes",
                    feasibility.ambiguous_axes()
                );
            }
            return Ok(shapes.into_iter().map(const_case).collect());
        }
    }

    let ndim = if operands.iter().any(|op| op.is_unknown_rank()) {
        None
    } else {
        aligned.first().map(|shape| shape.len())
    };
    if options.verbose {
        eprintln!("broadcast: using symbolic patterns for rank {:?}", ndim);
    }

    let mut cases: Vec<_> = broadcast_patterns(ndim)
        .iter()
        .map(|pattern| symbolic_case(operands, pattern))
        .collect();

    // Patterns don't cover all broadcast structures (eg. broadcasting on
    // different sides in adjacent axes), so finish with a case that accepts
    // anything the operands allow.
    if ndim.is_none_or(|ndim| ndim > 1) {
        let shapes = operands
            .iter()
            .map(|op| CaseShape::Original(op.shape().to_vec()))
            .collect();
        cases.push(SpecializationCase::new(CaseKind::Fallback, shapes));
    }

    Ok(cases)
}

/// Resolve an axis in `[-ndim, ndim)` to an index in `[0, ndim)`.
fn resolve_axis(ndim: usize, axis: i32) -> Result<usize, AxisError> {
    let out_of_range = AxisError::OutOfRange { axis, ndim };
    let signed_ndim = i32::try_from(ndim).map_err(|_| out_of_range.clone())?;
    if axis < -signed_ndim || axis >= signed_ndim {
        return Err(out_of_range);
    }
    let resolved = if axis < 0 { axis + signed_ndim } else { axis };
    Ok(resolved as usize)
}

/// Determine the range of the number of axes a reduction's axes operand may
/// list.
pub(crate) fn axis_count_range(
    axes: &OperandDescriptor,
    data_ndim: Option<usize>,
) -> Result<SizeRange, AxisError> {
    if let Some(values) = axes.const_axes_values() {
        // Without the data rank, negative and positive axes can't be
        // compared, so duplicates can't be removed.
        let Some(ndim) = data_ndim else {
            return Ok(if values.is_empty() {
                SizeRange::fixed(0)
            } else {
                SizeRange::between(1, values.len()).unwrap_or(SizeRange::at_least(1))
            });
        };
        let mut resolved = values
            .iter()
            .map(|&axis| resolve_axis(ndim, axis))
            .collect::<Result<SmallVec<[usize; 4]>, _>>()?;
        resolved.sort_unstable();
        resolved.dedup();
        return Ok(SizeRange::fixed(resolved.len()));
    }

    match axes.ndim() {
        None => Ok(SizeRange::at_least(0)),
        Some(0) => Ok(SizeRange::fixed(1)),
        Some(1) => Ok(axes.shape()[0].range().unwrap_or(SizeRange::at_least(0))),
        Some(ndim) => Err(AxisError::InvalidAxesRank { ndim }),
    }
}

/// Shape of the axes operand in a reduction case with `n_axes` reduced axes.
///
/// A scalar axes operand stays a scalar in cases which reduce one axis.
fn axes_case_shape(axes: &OperandDescriptor, n_axes: usize) -> CaseShape {
    if axes.ndim() == Some(0) && n_axes == 1 {
        CaseShape::Const(Vec::new())
    } else {
        CaseShape::Const(vec![n_axes])
    }
}

fn classify_reduce(
    operands: &[OperandDescriptor],
    options: &ClassifyOptions,
) -> Result<Vec<SpecializationCase>, ClassifyError> {
    let [data, rest @ ..] = operands else {
        return Err(ClassifyError::InvalidOperandCount {
            mode: ComputeMode::Reduce,
            count: 0,
        });
    };
    if rest.is_empty() {
        return Err(ClassifyError::InvalidOperandCount {
            mode: ComputeMode::Reduce,
            count: operands.len(),
        });
    }

    let axes_index = rest
        .iter()
        .position(|op| op.kind() == OperandKind::Axes)
        .map_or(1, |pos| pos + 1);
    let axes = &operands[axes_index];

    let axis_counts = axis_count_range(axes, data.ndim())?;
    let ndim = data.ndim().unwrap_or(options.max_rank);

    // Reductions that list no axes have no reduced run to place in the
    // alternating patterns, so they get their own flattened case.
    let mut patterns = Vec::new();
    if ndim > 0 && axis_counts.contains(0) {
        patterns.push(flattened_pattern());
    }
    patterns.extend(reduce_patterns(ndim));

    if options.verbose {
        eprintln!(
            "reduce: rank {} with {} reduced axes, up to {} after fusing",
            ndim,
            axis_counts,
            reduce_axis_count(axis_counts.as_fixed(), ndim)
        );
    }

    let range = symbolic_range(std::slice::from_ref(data));
    let cases = patterns
        .into_iter()
        .map(|pattern| {
            let reduce_axes = pattern.reduce_axes();
            let shapes = operands
                .iter()
                .enumerate()
                .map(|(i, op)| {
                    if i == 0 {
                        CaseShape::symbolic(pattern.clone(), range)
                    } else if i == axes_index {
                        axes_case_shape(axes, reduce_axes.len())
                    } else {
                        CaseShape::Original(op.shape().to_vec())
                    }
                })
                .collect();
            SpecializationCase::new(CaseKind::Symbolic, shapes).with_reduce_axes(reduce_axes)
        })
        .collect();

    Ok(cases)
}
