//! Internal testing utilities for rten-specialize.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Runs a test function over a table of cases and reports every failing case
/// at once.
///
/// Classification tests are mostly tables of input shapes and the expected
/// set of specialization cases. Running each row inside its own
/// `catch_unwind` means one broken row does not hide the others, and the
/// final panic lists the `Debug` form of every row that failed.
///
/// ```
/// use rten_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///     rank: usize,
///     expected_patterns: usize,
/// }
///
/// let cases = [
///     Case { rank: 1, expected_patterns: 1 },
///     Case { rank: 2, expected_patterns: 3 },
/// ];
///
/// cases.test_each(|case| {
///     let count = if case.rank <= 1 { 1 } else { 3 };
///     assert_eq!(count, case.expected_patterns);
/// });
/// ```
///
/// Captured values and cases must be unwind safe. Wrap a field in
/// [`AssertUnwindSafe`](std::panic::AssertUnwindSafe) if it is not.
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Call `test` with each case by value.
    ///
    /// The case is formatted before the call so that it can still be
    /// reported after it has been moved into the test function.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

fn report_failures(failures: &[String]) {
    assert!(
        failures.is_empty(),
        "{} test cases failed: {:#?}",
        failures.len(),
        failures
    );
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<String> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .map(|case| format!("{:?}", case))
            .collect();
        report_failures(&failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            let desc = format!("{:?}", case);
            let test = &test;
            if std::panic::catch_unwind(move || test(case)).is_err() {
                failures.push(desc);
            }
        }
        report_failures(&failures);
    }
}
