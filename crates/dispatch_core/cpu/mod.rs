//! Host-side reference computations the device results are checked against.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::Scalar;

/// Constant fill values for the quick matrix-multiply check; with these,
/// every element of `A * B` equals `order * AVAL * BVAL`.
pub const AVAL: Scalar = 3.0;
pub const BVAL: Scalar = 5.0;

/// Deterministic vector of values in `[0, 1)`.
pub fn random_vector(len: usize, seed: u64) -> Vec<Scalar> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0.0..1.0)).collect()
}

/// Elementwise `c = a + b`.
pub fn vector_add(a: &[Scalar], b: &[Scalar]) -> Vec<Scalar> {
    a.iter().zip(b.iter()).map(|(&x, &y)| x + y).collect()
}

/// Fused elementwise `r = a + b + c`.
pub fn vector_add3(a: &[Scalar], b: &[Scalar], c: &[Scalar]) -> Vec<Scalar> {
    a.iter()
        .zip(b.iter())
        .zip(c.iter())
        .map(|((&x, &y), &z)| x + y + z)
        .collect()
}

/// Square matrix of the given order, every element set to `value`.
pub fn constant_matrix(order: usize, value: Scalar) -> Vec<Scalar> {
    vec![value; order * order]
}

/// Sequential square matrix multiply, one dot product per output element.
///
/// Row-major `c[i][j] = sum_k a[i][k] * b[k][j]`, the same traversal the
/// device kernel performs per work item.
pub fn mat_mul_seq(order: usize, a: &[Scalar], b: &[Scalar], c: &mut [Scalar]) {
    for i in 0..order {
        for j in 0..order {
            let mut acc = 0.0;
            for k in 0..order {
                acc += a[i * order + k] * b[k * order + j];
            }
            c[i * order + j] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_vector_is_deterministic_and_bounded() {
        let first = random_vector(64, 0xA11CE);
        let again = random_vector(64, 0xA11CE);
        assert_eq!(first, again);
        assert!(first.iter().all(|&v| (0.0..1.0).contains(&v)));

        let other_seed = random_vector(64, 0xB0B);
        assert_ne!(first, other_seed);
    }

    #[test]
    fn vector_add_matches_manual_sum() {
        let a = [1.0, 2.0, 3.0];
        let b = [0.5, -2.0, 4.0];
        assert_eq!(vector_add(&a, &b), vec![1.5, 0.0, 7.0]);
    }

    #[test]
    fn vector_add3_is_the_fused_two_stage_sum() {
        let a = random_vector(32, 1);
        let b = random_vector(32, 2);
        let c = random_vector(32, 3);
        let chained = vector_add(&vector_add(&a, &b), &c);
        let fused = vector_add3(&a, &b, &c);
        for (x, y) in fused.iter().zip(chained.iter()) {
            assert!((x - y).abs() < 1.0e-6);
        }
    }

    #[test]
    fn constant_matmul_has_the_closed_form_product() {
        let order = 4;
        let a = constant_matrix(order, AVAL);
        let b = constant_matrix(order, BVAL);
        let mut c = vec![0.0; order * order];
        mat_mul_seq(order, &a, &b, &mut c);

        let expected = order as Scalar * AVAL * BVAL;
        assert!(c.iter().all(|&v| (v - expected).abs() < 1.0e-6));
    }

    #[test]
    fn mat_mul_seq_identity_leaves_operand_unchanged() {
        let order = 3;
        let mut identity = vec![0.0; order * order];
        for i in 0..order {
            identity[i * order + i] = 1.0;
        }
        let a: Vec<Scalar> = (0..order * order).map(|v| v as Scalar).collect();
        let mut c = vec![0.0; order * order];
        mat_mul_seq(order, &a, &identity, &mut c);
        assert_eq!(c, a);
    }
}
