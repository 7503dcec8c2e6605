//! Tolerance-based verification of computed results against a reference.

use crate::Scalar;

/// One failing element: where, what was expected, what arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub index: usize,
    pub expected: Scalar,
    pub actual: Scalar,
    /// Signed deviation `actual - expected`.
    pub error: Scalar,
}

/// Aggregated outcome of one verification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    pub correct: usize,
    pub total: usize,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn all_correct(&self) -> bool {
        self.correct == self.total
    }
}

/// Compare paired elements of `computed` and `reference`.
///
/// An element is correct iff its squared deviation is strictly below
/// `tolerance` squared; a deviation of exactly `tolerance` is a miss. The
/// pass is a single deterministic sweep and never stops at the first
/// failure — every mismatch is recorded with its operands.
pub fn verify(computed: &[Scalar], reference: &[Scalar], tolerance: Scalar) -> VerifyReport {
    let mut correct = 0;
    let mut mismatches = Vec::new();
    let mut total = 0;

    for (index, (&actual, &expected)) in computed.iter().zip(reference.iter()).enumerate() {
        total += 1;
        let error = actual - expected;
        if error * error < tolerance * tolerance {
            correct += 1;
        } else {
            mismatches.push(Mismatch { index, expected, actual, error });
        }
    }

    VerifyReport { correct, total, mismatches }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_arrays_are_all_correct() {
        let values = [0.0, 1.5, -2.25, 1.0e6];
        let report = verify(&values, &values, 1.0e-9);
        assert_eq!(report.correct, values.len());
        assert_eq!(report.total, values.len());
        assert!(report.all_correct());
        assert!(report.mismatches.is_empty());
    }

    #[test]
    fn deviation_exactly_at_tolerance_is_a_miss() {
        let tolerance = 0.001_f32;
        let reference = [1.0_f32];
        let computed = [1.0_f32 + tolerance];
        let report = verify(&computed, &reference, tolerance);
        assert_eq!(report.correct, 0);
        assert_eq!(report.total, 1);
    }

    #[test]
    fn deviation_just_inside_tolerance_passes() {
        let reference = [1.0_f32];
        let computed = [1.0_f32 + 0.0005];
        let report = verify(&computed, &reference, 0.001);
        assert!(report.all_correct());
    }

    #[test]
    fn mismatch_rows_carry_operands_and_signed_error() {
        let reference = [1.0_f32, 2.0, 3.0];
        let computed = [1.0_f32, 2.5, 2.0];
        let report = verify(&computed, &reference, 0.001);

        assert_eq!(report.correct, 1);
        assert_eq!(report.total, 3);
        assert_eq!(report.mismatches.len(), 2);

        let first = &report.mismatches[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.expected, 2.0);
        assert_eq!(first.actual, 2.5);
        assert!((first.error - 0.5).abs() < 1.0e-6);

        let second = &report.mismatches[1];
        assert_eq!(second.index, 2);
        assert!((second.error - (-1.0)).abs() < 1.0e-6);
    }

    #[test]
    fn pass_does_not_stop_at_first_failure() {
        let reference = vec![0.0_f32; 8];
        let computed = vec![1.0_f32; 8];
        let report = verify(&computed, &reference, 0.001);
        assert_eq!(report.mismatches.len(), 8);
    }

    #[test]
    fn negative_deviation_uses_squared_comparison() {
        let reference = [5.0_f32];
        let computed = [4.9995_f32];
        let report = verify(&computed, &reference, 0.001);
        assert!(report.all_correct());
    }
}
