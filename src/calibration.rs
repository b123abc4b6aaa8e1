//! Calibration records for nonlinear elements.
//!
//! Conversion efficiency and loss come from an external full-wave simulator
//! or bench measurement as a flat table keyed by component kind and
//! wavelength pair. The table is loaded once, is immutable afterwards, and is
//! passed explicitly wherever a nonlinear model is parameterized — several
//! tables (e.g. fabrication corners) can coexist without interference.
//!
//! The accepted text format is one record per line, whitespace-separated,
//! with `#` starting a comment:
//!
//! ```text
//! # kind     lambda_a_nm  lambda_b_nm  efficiency  loss_db
//! sfg_mixer  1064.0       1550.0       0.35        0.1
//! ```

use std::collections::BTreeMap;

use crate::constants::quantize_pm;
use crate::errors::SimError;
use crate::math::Scalar;

/// Calibrated behaviour of one nonlinear element at one wavelength pair.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    /// Power conversion efficiency into the sum-frequency product, in [0, 1].
    pub efficiency: Scalar,
    /// Excess insertion loss applied to every path through the element (dB).
    pub loss_db: Scalar,
}

/// Pair key: picometre-quantized wavelengths in ascending order, so lookup is
/// exact and insensitive to argument order.
fn pair_key(lambda_a_nm: Scalar, lambda_b_nm: Scalar) -> (i64, i64) {
    let a = quantize_pm(lambda_a_nm);
    let b = quantize_pm(lambda_b_nm);
    (a.min(b), a.max(b))
}

/// Immutable set of calibration records keyed by `(kind, wavelength pair)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    records: BTreeMap<(String, (i64, i64)), CalibrationRecord>,
}

impl CalibrationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, validating its ranges.
    pub fn insert(
        &mut self,
        kind: &str,
        lambda_a_nm: Scalar,
        lambda_b_nm: Scalar,
        record: CalibrationRecord,
    ) -> Result<(), SimError> {
        if !(0.0..=1.0).contains(&record.efficiency) {
            return Err(SimError::invalid_parameter(
                format!("calibration for `{kind}`"),
                "efficiency",
                format!("must lie in [0, 1], got {}", record.efficiency),
            ));
        }
        if record.loss_db < 0.0 {
            return Err(SimError::invalid_parameter(
                format!("calibration for `{kind}`"),
                "loss_db",
                format!("must be non-negative, got {}", record.loss_db),
            ));
        }
        if lambda_a_nm <= 0.0 || lambda_b_nm <= 0.0 {
            return Err(SimError::invalid_parameter(
                format!("calibration for `{kind}`"),
                "wavelength_pair",
                format!("wavelengths must be positive, got ({lambda_a_nm}, {lambda_b_nm})"),
            ));
        }
        self.records
            .insert((kind.to_string(), pair_key(lambda_a_nm, lambda_b_nm)), record);
        Ok(())
    }

    /// Parses a flat tabular calibration file.
    pub fn parse(text: &str) -> Result<Self, SimError> {
        let mut table = Self::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let location = format!("calibration line {}", idx + 1);
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 5 {
                return Err(SimError::invalid_parameter(
                    location,
                    "record",
                    format!("expected 5 columns, got {}", tokens.len()),
                ));
            }
            let parse = |name: &'static str, token: &str| -> Result<Scalar, SimError> {
                token.parse::<Scalar>().map_err(|_| {
                    SimError::invalid_parameter(
                        location.clone(),
                        name,
                        format!("not a number: `{token}`"),
                    )
                })
            };
            let lambda_a = parse("lambda_a_nm", tokens[1])?;
            let lambda_b = parse("lambda_b_nm", tokens[2])?;
            let efficiency = parse("efficiency", tokens[3])?;
            let loss_db = parse("loss_db", tokens[4])?;
            table.insert(
                tokens[0],
                lambda_a,
                lambda_b,
                CalibrationRecord {
                    efficiency,
                    loss_db,
                },
            )?;
        }
        Ok(table)
    }

    /// Looks up the record for a kind and wavelength pair.
    ///
    /// Fails with [`SimError::MissingCalibration`] when absent — an
    /// uncalibrated nonlinear element produces physically meaningless output,
    /// so there is deliberately no default.
    pub fn lookup(
        &self,
        kind: &str,
        lambda_a_nm: Scalar,
        lambda_b_nm: Scalar,
    ) -> Result<CalibrationRecord, SimError> {
        self.records
            .get(&(kind.to_string(), pair_key(lambda_a_nm, lambda_b_nm)))
            .copied()
            .ok_or_else(|| SimError::MissingCalibration {
                kind: kind.to_string(),
                lambda_a_nm,
                lambda_b_nm,
            })
    }

    /// Number of records in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const SAMPLE: &str = "\
# kind       lambda_a  lambda_b  efficiency  loss_db
sfg_mixer    1064.0    1550.0    0.35        0.1
sfg_mixer    1064.0    1064.0    0.30        0.1   # degenerate pair
";

    #[test]
    fn parses_records_and_ignores_comments() {
        let table = CalibrationTable::parse(SAMPLE).expect("valid table");
        assert_eq!(table.len(), 2);
        let rec = table.lookup("sfg_mixer", 1064.0, 1550.0).unwrap();
        assert_relative_eq!(rec.efficiency, 0.35);
        assert_relative_eq!(rec.loss_db, 0.1);
    }

    #[test]
    fn lookup_is_order_insensitive() {
        let table = CalibrationTable::parse(SAMPLE).unwrap();
        let fwd = table.lookup("sfg_mixer", 1064.0, 1550.0).unwrap();
        let rev = table.lookup("sfg_mixer", 1550.0, 1064.0).unwrap();
        assert_eq!(fwd, rev);
    }

    #[test]
    fn missing_pair_is_an_error_not_a_default() {
        let table = CalibrationTable::parse(SAMPLE).unwrap();
        let err = table.lookup("sfg_mixer", 1310.0, 1550.0).unwrap_err();
        assert!(matches!(err, SimError::MissingCalibration { .. }));
    }

    #[test]
    fn out_of_range_efficiency_is_rejected() {
        let err = CalibrationTable::parse("sfg_mixer 1064 1550 1.2 0.1").unwrap_err();
        assert!(matches!(
            err,
            SimError::InvalidParameter { name: "efficiency", .. }
        ));
    }

    #[test]
    fn malformed_rows_carry_line_numbers() {
        let err = CalibrationTable::parse("sfg_mixer 1064 1550 0.3").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
