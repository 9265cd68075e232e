//! Randomized tests that check classification results against shapes sampled
//! from operand descriptors.

use fastrand::Rng;

use crate::align::pad_shape;
use crate::classify::axis_count_range;
use crate::shape::{Dimension, OperandDescriptor};

/// Largest size sampled above the lower bound of a dynamic dimension.
const MAX_EXTRA_SIZE: usize = 4;

/// Largest rank sampled for operands of unknown rank.
const MAX_SAMPLED_RANK: usize = 4;

/// Sample a run-time shape that is consistent with `desc`.
pub fn sample_shape(rng: &mut Rng, desc: &OperandDescriptor) -> Vec<usize> {
    if desc.is_unknown_rank() {
        let ndim = rng.usize(0..=MAX_SAMPLED_RANK);
        return (0..ndim).map(|_| rng.usize(1..=MAX_EXTRA_SIZE)).collect();
    }

    desc.shape()
        .iter()
        .map(|dim| match dim {
            Dimension::Fixed(size) => *size,
            Dimension::Dynamic(range) => {
                let max = range
                    .max()
                    .unwrap_or(usize::MAX)
                    .min(range.min() + MAX_EXTRA_SIZE);
                rng.usize(range.min()..=max)
            }
            Dimension::UnknownRank => 1,
        })
        .collect()
}

/// Return true if shapes can be broadcast together.
pub fn broadcast_compatible(shapes: &[&[usize]]) -> bool {
    let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let Some(padded) = shapes
        .iter()
        .map(|s| pad_shape(s, ndim))
        .collect::<Option<Vec<_>>>()
    else {
        return false;
    };
    (0..ndim).all(|axis| {
        let mut sizes = padded.iter().map(|s| s[axis]).filter(|&s| s != 1);
        match sizes.next() {
            Some(first) => sizes.all(|s| s == first),
            None => true,
        }
    })
}

/// Sample shapes for each operand which can be broadcast together, or `None`
/// if no compatible shapes were found after `attempts` tries.
pub fn sample_broadcast_shapes(
    rng: &mut Rng,
    operands: &[OperandDescriptor],
    attempts: usize,
) -> Option<Vec<Vec<usize>>> {
    (0..attempts).find_map(|_| {
        let shapes: Vec<Vec<usize>> = operands.iter().map(|op| sample_shape(rng, op)).collect();
        let views: Vec<&[usize]> = shapes.iter().map(|s| s.as_slice()).collect();
        broadcast_compatible(&views).then_some(shapes)
    })
}

/// Sample the axes listed by a reduction's axes operand `axes` for an input
/// of shape `data_shape`.
///
/// Returns `None` if `axes` cannot list axes of this input, eg. if it
/// requires more axes than the input has.
pub fn sample_reduce_axes(
    rng: &mut Rng,
    data_shape: &[usize],
    axes: &OperandDescriptor,
) -> Option<Vec<usize>> {
    let ndim = data_shape.len();

    if let Some(values) = axes.const_axes_values() {
        let signed_ndim = i32::try_from(ndim).ok()?;
        let mut resolved = values
            .iter()
            .map(|&axis| {
                (axis >= -signed_ndim && axis < signed_ndim)
                    .then(|| axis.rem_euclid(signed_ndim) as usize)
            })
            .collect::<Option<Vec<_>>>()?;
        resolved.sort_unstable();
        resolved.dedup();
        return Some(resolved);
    }

    let counts = axis_count_range(axes, Some(ndim)).ok()?;
    let max_count = counts.max().unwrap_or(ndim).min(ndim);
    if counts.min() > max_count {
        return None;
    }
    let count = rng.usize(counts.min()..=max_count);

    let mut all_axes: Vec<usize> = (0..ndim).collect();
    rng.shuffle(&mut all_axes);
    let mut sampled = all_axes[..count].to_vec();
    sampled.sort_unstable();
    Some(sampled)
}

#[cfg(test)]
mod tests {
    use fastrand::Rng;
    use rayon::prelude::*;
    use rten_testing::TestCases;

    use super::{
        broadcast_compatible, sample_broadcast_shapes, sample_reduce_axes, sample_shape,
    };
    use crate::case::CaseKind;
    use crate::classify::{classify, ClassifyOptions, ComputeMode};
    use crate::dispatch::CaseTable;
    use crate::shape::{Dimension, OperandDescriptor, SizeRange};

    const SAMPLES: usize = 200;

    fn dyn_dims(n: usize) -> OperandDescriptor {
        OperandDescriptor::new(vec![Dimension::at_least(1); n])
    }

    fn as_views(shapes: &[Vec<usize>]) -> Vec<&[usize]> {
        shapes.iter().map(|s| s.as_slice()).collect()
    }

    #[test]
    fn test_broadcast_compatible() {
        assert!(broadcast_compatible(&[&[2, 3], &[3]]));
        assert!(broadcast_compatible(&[&[2, 1], &[1, 3]]));
        assert!(broadcast_compatible(&[&[], &[4, 5]]));
        assert!(!broadcast_compatible(&[&[2, 3], &[2]]));
    }

    #[test]
    fn test_sample_shape() {
        let mut rng = Rng::with_seed(1234);
        let desc = OperandDescriptor::new([
            Dimension::Fixed(3),
            Dimension::at_least(1),
            Dimension::between(2, 3).unwrap(),
        ]);
        for _ in 0..SAMPLES {
            let shape = sample_shape(&mut rng, &desc);
            assert!(desc.admits(&shape), "{:?} not admitted", shape);
        }

        for _ in 0..SAMPLES {
            let shape = sample_shape(&mut rng, &OperandDescriptor::unknown_rank());
            assert!(shape.len() <= 4);
        }
    }

    #[test]
    fn test_elementwise_coverage() {
        #[derive(Debug)]
        struct Case {
            operand: OperandDescriptor,
            count: usize,
        }

        let cases = [
            Case {
                operand: OperandDescriptor::fixed(&[4, 5]),
                count: 2,
            },
            Case {
                operand: dyn_dims(3),
                count: 3,
            },
            Case {
                operand: OperandDescriptor::new([Dimension::at_least(0), Dimension::Fixed(2)]),
                count: 2,
            },
            Case {
                operand: OperandDescriptor::unknown_rank(),
                count: 1,
            },
        ];

        cases.test_each(|case| {
            let operands = vec![case.operand.clone(); case.count];
            let cases = classify(
                &operands,
                ComputeMode::Elementwise,
                &ClassifyOptions::default(),
            )
            .unwrap();
            let table = CaseTable::new(&cases);

            let mut rng = Rng::with_seed(1234);
            for _ in 0..SAMPLES {
                let shape = sample_shape(&mut rng, &case.operand);
                let shapes = vec![shape.as_slice(); case.count];
                assert!(
                    table.select(&shapes).is_some(),
                    "no case for shapes {:?}",
                    shapes
                );
            }
        })
    }

    #[test]
    fn test_broadcast_coverage() {
        #[derive(Debug)]
        struct Case {
            operands: [OperandDescriptor; 2],
            options: ClassifyOptions,
        }

        let default_opts = ClassifyOptions::default;
        let cases = [
            // Constant enumeration
            Case {
                operands: [
                    OperandDescriptor::fixed(&[50, 10]),
                    OperandDescriptor::new([Dimension::at_least(1), Dimension::Fixed(10)]),
                ],
                options: default_opts(),
            },
            Case {
                operands: [
                    OperandDescriptor::fixed(&[3, 4, 5]),
                    OperandDescriptor::new([Dimension::at_least(1); 3]),
                ],
                options: default_opts(),
            },
            Case {
                operands: [OperandDescriptor::fixed(&[4, 6]), OperandDescriptor::fixed(&[6])],
                options: default_opts(),
            },
            Case {
                operands: [OperandDescriptor::fixed(&[]), OperandDescriptor::fixed(&[])],
                options: default_opts(),
            },
            // Symbolic patterns
            Case {
                operands: [dyn_dims(1), dyn_dims(1)],
                options: default_opts(),
            },
            Case {
                operands: [dyn_dims(3), dyn_dims(2)],
                options: default_opts(),
            },
            Case {
                operands: [dyn_dims(4), dyn_dims(4)],
                options: default_opts(),
            },
            Case {
                operands: [OperandDescriptor::unknown_rank(), dyn_dims(2)],
                options: default_opts(),
            },
            Case {
                operands: [
                    OperandDescriptor::new([Dimension::at_least(0); 2]),
                    dyn_dims(2),
                ],
                options: default_opts(),
            },
            // Target without broadcasting support. Operands are flattened,
            // so only equal shapes are sampled.
            Case {
                operands: [dyn_dims(2), dyn_dims(2)],
                options: ClassifyOptions {
                    broadcast: false,
                    ..Default::default()
                },
            },
        ];

        cases.test_each(|case| {
            let cases = classify(
                &case.operands,
                ComputeMode::ElementwiseBroadcast,
                &case.options,
            )
            .unwrap();
            let table = CaseTable::new(&cases);

            let mut rng = Rng::with_seed(1234);
            for _ in 0..SAMPLES {
                let shapes = if case.options.broadcast {
                    sample_broadcast_shapes(&mut rng, &case.operands, 100)
                } else {
                    let shape = sample_shape(&mut rng, &case.operands[0]);
                    Some(vec![shape.clone(), shape])
                };
                let Some(shapes) = shapes else {
                    continue;
                };
                let views = as_views(&shapes);
                assert!(
                    table.select(&views).is_some(),
                    "no case for shapes {:?}",
                    shapes
                );
            }
        })
    }

    #[test]
    fn test_broadcast_prefers_specific_cases() {
        let operands = [dyn_dims(3), dyn_dims(3)];
        let cases = classify(
            &operands,
            ComputeMode::ElementwiseBroadcast,
            &ClassifyOptions::default(),
        )
        .unwrap();
        let table = CaseTable::new(&cases);

        // Equal shapes never need the fallback case.
        let mut rng = Rng::with_seed(1234);
        for _ in 0..SAMPLES {
            let shape = sample_shape(&mut rng, &operands[0]);
            let (_, case) = table.select(&[shape.as_slice(), shape.as_slice()]).unwrap();
            assert_eq!(case.kind(), CaseKind::Symbolic);
        }
    }

    #[test]
    fn test_reduce_coverage() {
        #[derive(Debug)]
        struct Case {
            data: OperandDescriptor,
            axes: OperandDescriptor,
        }

        let cases = [
            Case {
                data: dyn_dims(1),
                axes: OperandDescriptor::axes([Dimension::at_least(1)]),
            },
            Case {
                data: dyn_dims(1),
                axes: OperandDescriptor::axes([Dimension::at_least(0)]),
            },
            Case {
                data: dyn_dims(1),
                axes: OperandDescriptor::axes([Dimension::Fixed(0)]),
            },
            Case {
                data: dyn_dims(1),
                axes: OperandDescriptor::const_axes(&[]),
            },
            Case {
                data: dyn_dims(3),
                axes: OperandDescriptor::axes([Dimension::at_least(1)]),
            },
            Case {
                data: dyn_dims(3),
                axes: OperandDescriptor::axes(Vec::<Dimension>::new()),
            },
            Case {
                data: dyn_dims(4),
                axes: OperandDescriptor::const_axes(&[0, -1]),
            },
            Case {
                data: OperandDescriptor::new([Dimension::at_least(0); 5]),
                axes: OperandDescriptor::axes([Dimension::at_least(0)]),
            },
            Case {
                data: OperandDescriptor::unknown_rank(),
                axes: OperandDescriptor::axes([Dimension::at_least(1)]),
            },
            Case {
                data: OperandDescriptor::unknown_rank(),
                axes: OperandDescriptor::unknown_rank(),
            },
        ];

        cases.test_each(|case| {
            let operands = [case.data.clone(), case.axes.clone()];
            let opts = ClassifyOptions {
                max_rank: 4,
                ..Default::default()
            };
            let cases = classify(&operands, ComputeMode::Reduce, &opts).unwrap();
            let table = CaseTable::new(&cases);

            let mut rng = Rng::with_seed(1234);
            for _ in 0..SAMPLES {
                let shape = sample_shape(&mut rng, &case.data);
                let Some(axes) = sample_reduce_axes(&mut rng, &shape, &case.axes) else {
                    continue;
                };
                assert!(
                    table.select_reduce(&shape, &axes).is_some(),
                    "no case for shape {:?} reduced over {:?}",
                    shape,
                    axes
                );
            }
        })
    }

    #[test]
    fn test_sample_reduce_axes() {
        let mut rng = Rng::with_seed(1234);

        let axes = OperandDescriptor::const_axes(&[0, -1]);
        assert_eq!(sample_reduce_axes(&mut rng, &[2, 3, 4], &axes), Some(vec![0, 2]));
        assert_eq!(sample_reduce_axes(&mut rng, &[], &axes), None);

        let axes = OperandDescriptor::axes([Dimension::Fixed(2)]);
        for _ in 0..SAMPLES {
            let sampled = sample_reduce_axes(&mut rng, &[2, 3, 4], &axes).unwrap();
            assert_eq!(sampled.len(), 2);
            assert!(sampled.windows(2).all(|w| w[0] < w[1] && w[1] < 3));
        }
        assert_eq!(sample_reduce_axes(&mut rng, &[5], &axes), None);

        // Axes operands which allow an empty list sometimes produce one.
        let axes = OperandDescriptor::axes([Dimension::at_least(0)]);
        let empty_count = (0..SAMPLES)
            .filter_map(|_| sample_reduce_axes(&mut rng, &[5], &axes))
            .filter(|axes| axes.is_empty())
            .count();
        assert!(empty_count > 0);
    }

    #[test]
    fn test_reduce_zero_sized_inputs() {
        let operands = [
            OperandDescriptor::new([Dimension::at_least(0), Dimension::at_least(0)]),
            OperandDescriptor::const_axes(&[1]),
        ];
        let cases = classify(&operands, ComputeMode::Reduce, &ClassifyOptions::default()).unwrap();
        for case in &cases {
            let ranges = case.operands()[0].ranges().unwrap();
            assert!(ranges.iter().all(|r| *r == SizeRange::at_least(0)));
        }
        let table = CaseTable::new(&cases);
        assert!(table.select_reduce(&[0, 3], &[1]).is_some());
    }

    #[test]
    fn test_concurrent_classification() {
        let inputs: Vec<(Vec<OperandDescriptor>, ComputeMode)> = vec![
            (vec![dyn_dims(2), dyn_dims(2)], ComputeMode::Elementwise),
            (
                vec![
                    OperandDescriptor::fixed(&[3, 4, 5]),
                    OperandDescriptor::new([Dimension::at_least(1); 3]),
                ],
                ComputeMode::ElementwiseBroadcast,
            ),
            (
                vec![dyn_dims(4), dyn_dims(2)],
                ComputeMode::ElementwiseBroadcast,
            ),
            (
                vec![dyn_dims(5), OperandDescriptor::const_axes(&[1, 3])],
                ComputeMode::Reduce,
            ),
            (
                vec![OperandDescriptor::unknown_rank(), dyn_dims(1)],
                ComputeMode::None,
            ),
        ];
        let opts = ClassifyOptions::default();

        let expected: Vec<_> = inputs
            .iter()
            .map(|(operands, mode)| classify(operands, *mode, &opts).unwrap())
            .collect();

        let actual: Vec<_> = (0..inputs.len() * 16)
            .into_par_iter()
            .map(|i| {
                let (operands, mode) = &inputs[i % inputs.len()];
                classify(operands, *mode, &opts).unwrap()
            })
            .collect();

        for (i, cases) in actual.iter().enumerate() {
            assert_eq!(*cases, expected[i % inputs.len()]);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_cases() {
        use serde_json::json;

        let operands = [dyn_dims(2), OperandDescriptor::const_axes(&[1])];
        let cases = classify(&operands, ComputeMode::Reduce, &ClassifyOptions::default()).unwrap();

        let actual = serde_json::to_value(&cases[0]).unwrap();
        let expected = json!({
            "kind": "Symbolic",
            "operands": [
                {
                    "Symbolic": {
                        "pattern": ["Common", "Reduce"],
                        "ranges": [
                            { "min": 1, "max": null },
                            { "min": 1, "max": null }
                        ]
                    }
                },
                { "Const": [1] }
            ],
            "reduce_axes": [1]
        });
        assert_eq!(actual, expected);
    }
}
