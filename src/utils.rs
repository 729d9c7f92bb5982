//! Utility functions and traits.

use crate::error::{LabError, Result};

use rand::{distributions::Uniform, prelude::*, rngs::SmallRng};

use std::{
    fmt,
    ops::{AddAssign, MulAssign},
};

/// Floating-point precision of a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    Single,
    Double,
}

/// Utility trait that generalizes floating-point types in the benchmarks and implements common
/// functionalities needed by the kernel and driver functions.
///
/// Also provides a generic way of generating floating-point scalars and vectors in the wanted type.
pub trait LabFloat:
    num::Float + Default + AddAssign + MulAssign + Send + Sync + ocl::OclPrm + fmt::Display + 'static
{
    /// Precision of the type, used to pick the matching kernel.
    const PRECISION: Precision;

    /// Produces a random scalar in the range [-100.0, 100.0).
    fn rand_scalar(rng: &mut SmallRng) -> Self;

    /// Produces a random vector of length `n`, filled with values in the range [-100.0, 100.0).
    fn rand_vector(n: usize, rng: &mut SmallRng) -> Vec<Self>;

    /// Produces a random vector of length `n` filled with integer values in [-100, 100].
    ///
    /// Used for matrices: products and sums of such values stay exact for longer, so device and
    /// host GEMMs can be compared with a tight tolerance.
    fn rand_integers(n: usize, rng: &mut SmallRng) -> Vec<Self>;

    /// Converts to `f64` for comparisons and reporting.
    fn as_f64(self) -> f64;
}

macro_rules! impl_lab_float {
    ($t:ty, $precision:expr) => {
        impl LabFloat for $t {
            const PRECISION: Precision = $precision;

            fn rand_scalar(rng: &mut SmallRng) -> Self {
                Uniform::new(-100.0 as $t, 100.0 as $t).sample(rng)
            }

            fn rand_vector(n: usize, rng: &mut SmallRng) -> Vec<Self> {
                let between = Uniform::new(-100.0 as $t, 100.0 as $t);
                (0..n).map(|_| between.sample(rng)).collect()
            }

            fn rand_integers(n: usize, rng: &mut SmallRng) -> Vec<Self> {
                let between = Uniform::new_inclusive(-100_i32, 100_i32);
                (0..n).map(|_| between.sample(rng) as $t).collect()
            }

            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_lab_float!(f32, Precision::Single);
impl_lab_float!(f64, Precision::Double);

/// Creates the random number generator shared by all inputs of a run.
///
/// A given `seed` makes the run reproducible; without one the generator is seeded from the OS.
pub fn new_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

/// Largest element-wise difference between a reference result and a variant's result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Discrepancy {
    /// Absolute difference.
    pub diff: f64,
    /// Position of the largest difference.
    pub index: usize,
    /// Reference value at `index`.
    pub expected: f64,
    /// Variant value at `index`.
    pub actual: f64,
}

impl Discrepancy {
    /// Whether the difference stays within `tolerance`, never the case for a NaN difference.
    pub fn within(&self, tolerance: f64) -> bool {
        self.diff <= tolerance
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max difference {} at index {} (expected {}, got {})",
            self.diff, self.index, self.expected, self.actual
        )
    }
}

/// Compares `actual` against `expected` and returns the largest absolute difference.
///
/// Empty inputs compare as identical. Equal values (infinities included) differ by zero, while a
/// NaN on either side yields a NaN difference, which outranks any finite one.
pub fn max_abs_diff<T: LabFloat>(expected: &[T], actual: &[T]) -> Result<Discrepancy> {
    if expected.len() != actual.len() {
        return Err(LabError::ShapeMismatch(format!(
            "cannot compare {} elements against {}",
            actual.len(),
            expected.len()
        )));
    }

    let mut worst = Discrepancy {
        diff: 0.0,
        index: 0,
        expected: expected.first().map_or(0.0, |e| e.as_f64()),
        actual: actual.first().map_or(0.0, |a| a.as_f64()),
    };
    for (index, (e, a)) in expected.iter().zip(actual).enumerate() {
        let (e, a) = (e.as_f64(), a.as_f64());
        let diff = if e == a { 0.0 } else { (e - a).abs() };
        if diff.is_nan() || diff > worst.diff {
            worst = Discrepancy {
                diff,
                index,
                expected: e,
                actual: a,
            };
            if diff.is_nan() {
                break;
            }
        }
    }

    Ok(worst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_inputs_are_reproducible() {
        let a = f64::rand_vector(64, &mut new_rng(Some(7)));
        let b = f64::rand_vector(64, &mut new_rng(Some(7)));
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (-100.0..100.0).contains(v)));
    }

    #[test]
    fn successive_draws_differ() {
        let mut rng = new_rng(Some(7));
        let x = f32::rand_vector(16, &mut rng);
        let y = f32::rand_vector(16, &mut rng);
        assert_ne!(x, y);
    }

    #[test]
    fn integer_inputs_have_no_fraction() {
        let m = f32::rand_integers(256, &mut new_rng(Some(3)));
        assert!(m.iter().all(|v| v.fract() == 0.0 && v.abs() <= 100.0));
    }

    #[test]
    fn reports_largest_difference() {
        let expected = [1.0_f32, 2.0, 3.0, 4.0];
        let actual = [1.0_f32, 2.5, 2.0, 4.0];
        let worst = max_abs_diff(&expected, &actual).unwrap();
        assert_eq!(worst.index, 2);
        assert_eq!(worst.diff, 1.0);
        assert!(!worst.within(0.01));

        let same = max_abs_diff(&expected, &expected).unwrap();
        assert!(same.within(0.0));
    }

    #[test]
    fn nan_results_are_never_within_tolerance() {
        let worst = max_abs_diff(&[1.0_f32, 2.0, 3.0], &[1.0, f32::NAN, 3.0]).unwrap();
        assert!(worst.diff.is_nan());
        assert_eq!(worst.index, 1);
        assert!(!worst.within(0.01));

        // A NaN outranks a larger finite difference found earlier
        let worst = max_abs_diff(&[0.0_f64, 1.0], &[50.0, f64::NAN]).unwrap();
        assert_eq!(worst.index, 1);
        assert!(!worst.within(100.0));
    }

    #[test]
    fn infinities_compare_by_value() {
        let inf = f64::INFINITY;
        assert!(max_abs_diff(&[inf, -inf], &[inf, -inf]).unwrap().within(0.0));

        let worst = max_abs_diff(&[inf], &[-inf]).unwrap();
        assert_eq!(worst.diff, inf);
        assert!(!worst.within(0.01));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = max_abs_diff(&[1.0_f64], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, LabError::ShapeMismatch(_)));
    }
}
