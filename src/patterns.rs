//! Symbolic axis-role patterns used when constant shapes cannot cover all
//! run-time shapes.

use crate::shape::{AxisRole, Pattern};

use AxisRole::{Broadcast, Common, Reduce};

/// Patterns compiled for broadcasting operators, in priority order.
///
/// Each entry describes the structure of the operand shapes after adjacent
/// axes with the same role have been fused.
pub const BROADCAST_PATTERNS: [&[AxisRole]; 5] = [
    &[Common],
    &[Common, Broadcast],
    &[Common, Broadcast, Common],
    &[Broadcast],
    &[Broadcast, Common],
];

/// Length of the longest entry in [`BROADCAST_PATTERNS`].
pub const MAX_BROADCAST_PATTERN_LEN: usize = 3;

/// Return the broadcast patterns to compile for operands of rank `ndim`, or
/// unknown rank if `None`.
///
/// Patterns longer than `ndim` are skipped. Operands with rank <= 1 only get
/// the single-axis `[Common]` pattern.
pub fn broadcast_patterns(ndim: Option<usize>) -> Vec<Pattern> {
    let ndim = ndim.unwrap_or(MAX_BROADCAST_PATTERN_LEN);
    if ndim <= 1 {
        return vec![Pattern::new(&[Common])];
    }
    BROADCAST_PATTERNS
        .iter()
        .filter(|p| p.len() <= ndim)
        .map(|p| Pattern::new(p))
        .collect()
}

/// Pattern of a kernel compiled without broadcasting support, where all
/// operands are flattened to one dimension.
pub fn flattened_pattern() -> Pattern {
    Pattern::new(&[Common])
}

/// Maximum number of distinct reduced axis groups for a tensor of rank `ndim`,
/// after adjacent reduced and non-reduced axes have been fused.
pub fn max_reduce_axes(ndim: usize) -> usize {
    ndim.div_ceil(2)
}

/// Clamp the number of reduced axes declared by an axes operand. If the
/// count is unknown, this returns the maximum.
pub fn reduce_axis_count(declared: Option<usize>, ndim: usize) -> usize {
    let max = max_reduce_axes(ndim);
    declared.map_or(max, |count| count.min(max))
}

fn alternating(len: usize) -> Pattern {
    (0..len)
        .map(|i| if i % 2 == 0 { Common } else { Reduce })
        .collect()
}

/// Return the reduction patterns to compile for a data operand of rank
/// `ndim`.
///
/// Patterns alternate between [`AxisRole::Common`] and [`AxisRole::Reduce`].
/// Patterns of length `2..=upper_bound` start with `Common`. The final
/// pattern has length `upper_bound + 1`, minus its leading `Common` axis if
/// that would make it longer than the data operand. Any reduction over
/// `ndim` axes, with adjacent reduced or kept axes fused, fits one of these
/// patterns by inserting size-1 axes.
pub fn reduce_patterns(ndim: usize) -> Vec<Pattern> {
    if ndim == 0 {
        return vec![Pattern::default()];
    }

    let upper_bound = (max_reduce_axes(ndim) * 2).min(ndim);
    let mut patterns: Vec<Pattern> = (1..upper_bound).map(|i| alternating(i + 1)).collect();

    let boundary = alternating(upper_bound + 1);
    let boundary = if upper_bound >= ndim {
        boundary.roles()[1..].iter().copied().collect()
    } else {
        boundary
    };
    patterns.push(boundary);

    patterns
}
