use crate::config::{Number, EPSILON};
use crate::error::{Result, StoreError};
use wide::f32x8;

fn lanes(s: &[Number]) -> f32x8 {
    f32x8::new([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]])
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)` accumulated with SIMD operations.
///
/// Unlike a plain division this refuses inputs that would yield a meaningless
/// score: vectors of different length give `DimensionMismatch`, and a vector
/// with (near) zero magnitude gives `ZeroMagnitude` instead of `NaN`. Sums that
/// leave the `f32` range give `NonFinite`.
pub fn cosine_similarity(a: &[Number], b: &[Number]) -> Result<Number> {
    if a.len() != b.len() {
        return Err(StoreError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }

    let mut dot_product = f32x8::splat(0.0);
    let mut mag_a = f32x8::splat(0.0);
    let mut mag_b = f32x8::splat(0.0);

    let len = a.len();
    let simd_len = len - (len % 8);

    for i in (0..simd_len).step_by(8) {
        let va = lanes(&a[i..i + 8]);
        let vb = lanes(&b[i..i + 8]);
        dot_product += va * vb;
        mag_a += va * va;
        mag_b += vb * vb;
    }

    let mut scalar_dot_product = dot_product.reduce_add();
    let mut scalar_mag_a = mag_a.reduce_add();
    let mut scalar_mag_b = mag_b.reduce_add();

    // Remainder
    for i in simd_len..len {
        scalar_dot_product += a[i] * b[i];
        scalar_mag_a += a[i] * a[i];
        scalar_mag_b += b[i] * b[i];
    }

    if !(scalar_dot_product.is_finite() && scalar_mag_a.is_finite() && scalar_mag_b.is_finite()) {
        return Err(StoreError::NonFinite);
    }

    let norm_a = scalar_mag_a.sqrt();
    let norm_b = scalar_mag_b.sqrt();
    if norm_a <= EPSILON || norm_b <= EPSILON {
        return Err(StoreError::ZeroMagnitude);
    }

    Ok((scalar_dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Number, b: Number) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn orthogonal_and_parallel() {
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0));
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[3.0, 0.0]).unwrap(), 1.0));
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]).unwrap(), -1.0));
        assert!(approx(
            cosine_similarity(&[1.0, 0.0], &[1.0, 1.0]).unwrap(),
            std::f32::consts::FRAC_1_SQRT_2
        ));
    }

    #[test]
    fn simd_path_matches_scalar_formula() {
        let a: Vec<Number> = (0..19).map(|i| (i as Number * 0.37).sin()).collect();
        let b: Vec<Number> = (0..19).map(|i| (i as Number * 0.11).cos()).collect();

        let dot: Number = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let na: Number = a.iter().map(|x| x * x).sum::<Number>().sqrt();
        let nb: Number = b.iter().map(|x| x * x).sum::<Number>().sqrt();

        assert!(approx(cosine_similarity(&a, &b).unwrap(), dot / (na * nb)));
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn zero_vector_is_an_error() {
        assert!(matches!(
            cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]),
            Err(StoreError::ZeroMagnitude)
        ));
        assert!(matches!(
            cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]),
            Err(StoreError::ZeroMagnitude)
        ));
    }

    #[test]
    fn overflowing_components_are_an_error() {
        assert!(matches!(
            cosine_similarity(&[1e20, 1.0], &[1.0, 0.0]),
            Err(StoreError::NonFinite)
        ));
        let wide_a = [3e19; 9];
        let wide_b = [1.0; 9];
        assert!(matches!(cosine_similarity(&wide_a, &wide_b), Err(StoreError::NonFinite)));
        assert!(matches!(
            cosine_similarity(&[Number::NAN, 1.0], &[1.0, 1.0]),
            Err(StoreError::NonFinite)
        ));
    }
}
