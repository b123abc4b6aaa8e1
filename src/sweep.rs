//! Wavelength sweep utilities and post-processing helpers.

use crate::math::{CScalar, Scalar};

/// Generates `n` linearly spaced wavelengths in `[start_nm, stop_nm]`.
#[must_use]
pub fn wavelength_linspace(start_nm: Scalar, stop_nm: Scalar, n: usize) -> Vec<Scalar> {
    match n {
        0 => Vec::new(),
        1 => vec![start_nm],
        _ => {
            let step = (stop_nm - start_nm) / (n as Scalar - 1.0);
            (0..n).map(|i| start_nm + step * i as Scalar).collect()
        }
    }
}

/// Applies `f` to each wavelength and collects results.
#[must_use]
pub fn sweep_map<I, F, T>(wavelengths_nm: I, mut f: F) -> Vec<T>
where
    I: IntoIterator<Item = Scalar>,
    F: FnMut(Scalar) -> T,
{
    wavelengths_nm.into_iter().map(|l| f(l)).collect()
}

/// Magnitude of a complex coefficient sequence.
#[must_use]
pub fn mag(values: impl IntoIterator<Item = CScalar>) -> Vec<Scalar> {
    values.into_iter().map(|v| v.norm()).collect()
}

/// Transmission in dB (`20·log10|t|`), clamping very small values.
#[must_use]
pub fn mag_db(values: impl IntoIterator<Item = CScalar>) -> Vec<Scalar> {
    const MIN: Scalar = 1e-300;
    values
        .into_iter()
        .map(|v| 20.0 * (v.norm().max(MIN)).log10())
        .collect()
}

/// Phase in radians of a complex coefficient sequence.
#[must_use]
pub fn phase_rad(values: impl IntoIterator<Item = CScalar>) -> Vec<Scalar> {
    values.into_iter().map(|v| v.arg()).collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn linspace_basic() {
        let v = wavelength_linspace(1540.0, 1560.0, 5);
        assert_eq!(v, vec![1540.0, 1545.0, 1550.0, 1555.0, 1560.0]);
    }

    #[test]
    fn mag_db_matches_reference() {
        let db = mag_db([CScalar::new(0.5, 0.0)]);
        assert_relative_eq!(db[0], -6.020_599_913_279_624, epsilon = 1.0e-9);
    }

    #[test]
    fn sweep_map_runs_function() {
        let out = sweep_map(vec![1540.0, 1550.0], |l| l + 10.0);
        assert_eq!(out, vec![1550.0, 1560.0]);
    }
}
