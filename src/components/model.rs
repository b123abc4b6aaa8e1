//! Scattering maps and the component model trait.

use std::collections::BTreeMap;

use crate::errors::SimError;
use crate::math::{CScalar, Scalar};

/// One directed coupling between two ports of a component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    /// Complex transmission/reflection coefficient.
    pub coeff: CScalar,
    /// Carrier wavelength at the destination port when the coupling
    /// translates the carrier (sum-frequency conversion); `None` for linear
    /// couplings that preserve it.
    pub translated_nm: Option<Scalar>,
}

/// Scattering map: ordered port pairs to complex coupling coefficients.
///
/// Covers every port pair with non-negligible coupling; absent pairs read as
/// zero. Entries are ordered deterministically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SMap {
    entries: BTreeMap<(String, String), Transfer>,
}

impl SMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a directed coupling `from → to`.
    pub fn insert(&mut self, from: &str, to: &str, coeff: CScalar) {
        self.entries.insert(
            (from.to_string(), to.to_string()),
            Transfer {
                coeff,
                translated_nm: None,
            },
        );
    }

    /// Inserts the reciprocal pair `a ↔ b` with one coefficient.
    pub fn insert_symmetric(&mut self, a: &str, b: &str, coeff: CScalar) {
        self.insert(a, b, coeff);
        self.insert(b, a, coeff);
    }

    /// Inserts a carrier-translating coupling `from → to` whose output
    /// carrier is `translated_nm`.
    pub fn insert_translated(&mut self, from: &str, to: &str, coeff: CScalar, translated_nm: Scalar) {
        self.entries.insert(
            (from.to_string(), to.to_string()),
            Transfer {
                coeff,
                translated_nm: Some(translated_nm),
            },
        );
    }

    /// Looks up the coupling `from → to`.
    #[must_use]
    pub fn get(&self, from: &str, to: &str) -> Option<&Transfer> {
        self.entries.get(&(from.to_string(), to.to_string()))
    }

    /// Coefficient for `from → to`, zero when absent.
    #[must_use]
    pub fn coeff(&self, from: &str, to: &str) -> CScalar {
        self.get(from, to).map_or(CScalar::default(), |t| t.coeff)
    }

    /// Iterates `(from, to, transfer)` in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Transfer)> {
        self.entries
            .iter()
            .map(|((f, t), tr)| (f.as_str(), t.as_str(), tr))
    }

    /// Number of couplings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no couplings are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when `coeff(a→b) == coeff(b→a)` for every pair, within `tol`.
    ///
    /// Holds for passive linear elements; deliberately fails for directional
    /// and nonlinear ones.
    #[must_use]
    pub fn is_reciprocal(&self, tol: Scalar) -> bool {
        self.entries.iter().all(|((from, to), transfer)| {
            let back = self.coeff(to, from);
            (transfer.coeff - back).norm() <= tol
        })
    }

    /// Total output power for a unit excitation at `from`: `Σ_to |coeff|²`.
    #[must_use]
    pub fn driven_power(&self, from: &str) -> Scalar {
        self.entries
            .iter()
            .filter(|((f, _), _)| f == from)
            .map(|(_, t)| t.coeff.norm_sqr())
            .sum()
    }

    /// True when no driven port emits more power than it receives,
    /// `driven_power ≤ 1 + tol` for every source port.
    #[must_use]
    pub fn is_passive(&self, tol: Scalar) -> bool {
        let mut sources: Vec<&str> = self.entries.keys().map(|(f, _)| f.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        sources.iter().all(|f| self.driven_power(f) <= 1.0 + tol)
    }
}

/// A compact frequency-domain model of one physical element.
///
/// Implementations are pure: the same `(wavelength, parameters)` always
/// yields the same map. Evaluation outside a model's documented validity
/// range fails with [`SimError::InvalidParameter`] — never a silent
/// extrapolation.
pub trait ComponentModel {
    /// Stable component-kind identifier (also the calibration key).
    fn kind(&self) -> &'static str;

    /// Names of all ports the model exposes.
    fn ports(&self) -> Vec<String>;

    /// Evaluates the scattering map at a carrier wavelength (nm).
    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError>;
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn absent_pairs_read_as_zero() {
        let map = SMap::new();
        assert_relative_eq!(map.coeff("in", "out").norm(), 0.0);
    }

    #[test]
    fn symmetric_insert_is_reciprocal() {
        let mut map = SMap::new();
        map.insert_symmetric("in", "out", CScalar::new(0.0, 0.9));
        assert!(map.is_reciprocal(1.0e-12));
    }

    #[test]
    fn directed_insert_is_not_reciprocal() {
        let mut map = SMap::new();
        map.insert("a", "sfg", CScalar::new(0.6, 0.0));
        assert!(!map.is_reciprocal(1.0e-12));
    }

    #[test]
    fn passivity_bounds_driven_power() {
        let mut map = SMap::new();
        map.insert("in", "out0", CScalar::new(0.8, 0.0));
        map.insert("in", "out1", CScalar::new(0.6, 0.0));
        assert!(map.is_passive(1.0e-9));
        map.insert("in", "out2", CScalar::new(0.5, 0.0));
        assert!(!map.is_passive(1.0e-9));
    }

    #[test]
    fn translated_couplings_keep_their_carrier() {
        let mut map = SMap::new();
        map.insert_translated("a", "sfg", CScalar::new(0.5, 0.0), 630.7);
        let t = map.get("a", "sfg").unwrap();
        assert_relative_eq!(t.translated_nm.unwrap(), 630.7);
    }
}
