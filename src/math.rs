//! Shared numerical primitives anchored on `num-complex`.

/// Primary scalar type used across the crate.
pub type Scalar = f64;
/// Primary complex scalar type used for field amplitudes.
pub type CScalar = num_complex::Complex<Scalar>;

/// Returns the complex exponential `e^(j * theta)` using `Scalar` precision.
#[must_use]
pub fn phasor(theta: Scalar) -> CScalar {
    CScalar::from_polar(1.0, theta)
}

/// Optical power carried by a complex amplitude, `|a|²`.
#[must_use]
pub fn power(amplitude: CScalar) -> Scalar {
    amplitude.norm_sqr()
}

/// Power ratio in dB, clamping very small operands.
#[must_use]
pub fn power_ratio_db(numerator: Scalar, denominator: Scalar) -> Scalar {
    const MIN: Scalar = 1e-300;
    10.0 * (numerator.max(MIN) / denominator.max(MIN)).log10()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn phasor_has_unit_magnitude() {
        let p = phasor(1.234);
        assert_relative_eq!(p.norm(), 1.0, epsilon = 1.0e-12);
    }

    #[test]
    fn power_is_squared_magnitude() {
        let a = CScalar::new(3.0, 4.0);
        assert_relative_eq!(power(a), 25.0, epsilon = 1.0e-12);
    }

    #[test]
    fn power_ratio_db_matches_reference() {
        assert_relative_eq!(power_ratio_db(10.0, 1.0), 10.0, epsilon = 1.0e-12);
        assert_relative_eq!(
            power_ratio_db(1.0, 2.0),
            -3.010_299_956_639_812,
            epsilon = 1.0e-9
        );
    }
}
