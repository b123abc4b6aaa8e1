//! Logic-level test harness and comparator.
//!
//! A [`TestVector`] assigns ternary values to the circuit's logical inputs
//! and states the expected read-out. The harness encodes each input through
//! the channel table, excites the solver once per driven input (linear
//! superposition holds outside the mixers; their nonlinearity lives in the
//! calibrated compact models), accumulates per-channel detector power across
//! excitations, decodes, and compares — reporting per-channel power so a
//! failure can be triaged without re-running the solver.

use std::collections::BTreeMap;

use crate::builder::{accumulator_row, weight_chip};
use crate::calibration::CalibrationTable;
use crate::channels::{ChannelTable, Trit};
use crate::constants::quantize_pm;
use crate::errors::SimError;
use crate::flatten::flatten;
use crate::math::Scalar;
use crate::netlist::Endpoint;
use crate::solver::Solver;

/// One logical read-out: the detector endpoints whose channel powers
/// accumulate into a single decoded value.
#[derive(Debug, Clone)]
pub struct ReadoutGroup {
    /// Display label, e.g. `row0`.
    pub label: String,
    /// Detector endpoints in the flattened circuit.
    pub taps: Vec<Endpoint>,
}

/// How accumulated channel powers decode into a ternary value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadoutPolicy {
    /// The strongest channel decodes through the inverse table. Fails when
    /// the power ratio between the dominant and runner-up channel drops
    /// below `min_margin`, modelling detector-threshold ambiguity.
    DominantChannel {
        /// Required dominant/runner-up power ratio.
        min_margin: Scalar,
        /// Powers below this floor count as dark.
        dark_floor: Scalar,
    },
    /// Balanced read-out for accumulated outputs: the value is the sign of
    /// `P(+1 channels) − P(−1 channels)` against a dark threshold, the
    /// balanced-photodetector reading of a ternary sum.
    Balanced {
        /// Differential power below which the value reads as zero.
        dark_threshold: Scalar,
        /// Required margin (see [`Harness::run_test_vector`]).
        min_margin: Scalar,
    },
}

/// Input assignment plus expected read-out.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestVector {
    /// One value per logical input, in harness input order.
    pub inputs: Vec<Trit>,
    /// One value per read-out group.
    pub expected: Vec<Trit>,
}

impl TestVector {
    /// Creates a test vector.
    #[must_use]
    pub fn new(inputs: Vec<Trit>, expected: Vec<Trit>) -> Self {
        Self { inputs, expected }
    }
}

/// Result of one test-vector run.
#[derive(Debug, Clone)]
pub struct VectorOutcome {
    /// True when every read-out decoded to its expected value with margin.
    pub pass: bool,
    /// Decoded value per read-out group; `None` when all channels are dark
    /// or the dominant carrier is not a table channel.
    pub decoded: Vec<Option<Trit>>,
    /// Discrimination margin per read-out group.
    pub margins: Vec<Scalar>,
    /// Accumulated `(wavelength, power)` per read-out group, ascending by
    /// wavelength.
    pub per_channel_power: Vec<Vec<(Scalar, Scalar)>>,
}

impl VectorOutcome {
    /// Smallest margin across read-out groups.
    #[must_use]
    pub fn worst_margin(&self) -> Scalar {
        self.margins.iter().copied().fold(Scalar::INFINITY, Scalar::min)
    }
}

/// Aggregate result of a suite run.
#[derive(Debug, Clone)]
pub struct SuiteSummary {
    /// Vectors that passed.
    pub passed: usize,
    /// Vectors that failed.
    pub failed: usize,
    /// Smallest margin observed across all vectors.
    pub worst_case_margin: Scalar,
    /// Per-vector outcomes, in input order.
    pub outcomes: Vec<VectorOutcome>,
}

/// Harness binding a solver to logical inputs and read-out groups.
pub struct Harness {
    solver: Solver,
    table: ChannelTable,
    input_ports: Vec<String>,
    outputs: Vec<ReadoutGroup>,
    policy: ReadoutPolicy,
}

impl Harness {
    /// Binds a harness, validating that every read-out tap exists in the
    /// solver's circuit.
    pub fn new(
        solver: Solver,
        table: ChannelTable,
        input_ports: Vec<String>,
        outputs: Vec<ReadoutGroup>,
        policy: ReadoutPolicy,
    ) -> Result<Self, SimError> {
        if input_ports.is_empty() || outputs.is_empty() {
            return Err(SimError::invalid_parameter(
                format!("harness for `{}`", solver.circuit_name()),
                "bindings",
                "at least one input port and one read-out group are required",
            ));
        }
        for port in &input_ports {
            if !solver.external_ports().any(|p| p == port) {
                return Err(SimError::DanglingPort {
                    netlist: solver.circuit_name().to_string(),
                    instance: "(external)".to_string(),
                    port: port.clone(),
                });
            }
        }
        for group in &outputs {
            for tap in &group.taps {
                if !solver.has_endpoint(&tap.instance, &tap.port) {
                    return Err(SimError::DanglingPort {
                        netlist: solver.circuit_name().to_string(),
                        instance: tap.instance.clone(),
                        port: tap.port.clone(),
                    });
                }
            }
        }
        Ok(Self {
            solver,
            table,
            input_ports,
            outputs,
            policy,
        })
    }

    /// Builds the standard harness for one [`accumulator_row`] netlist:
    /// inputs `x{j}` then `w{j}`, one read-out group over `det{k}`.
    ///
    /// The mixers are calibration-bound to the carrier pairs encoding
    /// `(inputs, weights)`, so run vectors that drive the same assignment.
    pub fn for_accumulator_row(
        table: &ChannelTable,
        calibration: &CalibrationTable,
        weights: &[Trit],
        inputs: &[Trit],
        policy: ReadoutPolicy,
    ) -> Result<Self, SimError> {
        let row = accumulator_row("row", table, calibration, weights, inputs)?;
        let solver = Solver::new(&flatten(&row)?)?;
        let n = weights.len();
        let input_ports = (0..n)
            .map(|j| format!("x{j}"))
            .chain((0..n).map(|j| format!("w{j}")))
            .collect();
        let taps = (0..table.output_channels().len())
            .map(|k| Endpoint::new(format!("det{k}"), "in"))
            .collect();
        Self::new(
            solver,
            table.clone(),
            input_ports,
            vec![ReadoutGroup {
                label: "row".to_string(),
                taps,
            }],
            policy,
        )
    }

    /// Builds the standard harness for a [`weight_chip`] netlist: inputs
    /// `x{j}` then `w{r}_{j}` row-major, one read-out group per row over
    /// `row{r}.det{k}`.
    ///
    /// The mixers are calibration-bound to the carrier pairs encoding
    /// `(inputs, weights)`, so run vectors that drive the same assignment.
    pub fn for_weight_chip(
        table: &ChannelTable,
        calibration: &CalibrationTable,
        weights: &[Vec<Trit>],
        inputs: &[Trit],
        policy: ReadoutPolicy,
    ) -> Result<Self, SimError> {
        let chip = weight_chip("chip", table, calibration, weights, inputs)?;
        let solver = Solver::new(&flatten(&chip)?)?;
        let rows = weights.len();
        let cols = inputs.len();
        let input_ports = (0..cols)
            .map(|j| format!("x{j}"))
            .chain((0..rows).flat_map(|r| (0..cols).map(move |j| format!("w{r}_{j}"))))
            .collect();
        let outputs = (0..rows)
            .map(|r| ReadoutGroup {
                label: format!("row{r}"),
                taps: (0..table.output_channels().len())
                    .map(|k| Endpoint::new(format!("row{r}.det{k}"), "in"))
                    .collect(),
            })
            .collect();
        Self::new(solver, table.clone(), input_ports, outputs, policy)
    }

    /// The logical input ports, in test-vector order.
    #[must_use]
    pub fn input_ports(&self) -> &[String] {
        &self.input_ports
    }

    /// Encodes, solves, accumulates, decodes, and compares one test vector.
    pub fn run_test_vector(&self, vector: &TestVector) -> Result<VectorOutcome, SimError> {
        if vector.inputs.len() != self.input_ports.len() {
            return Err(SimError::invalid_parameter(
                format!("harness for `{}`", self.solver.circuit_name()),
                "inputs",
                format!(
                    "vector drives {} inputs, harness binds {}",
                    vector.inputs.len(),
                    self.input_ports.len()
                ),
            ));
        }
        if vector.expected.len() != self.outputs.len() {
            return Err(SimError::invalid_parameter(
                format!("harness for `{}`", self.solver.circuit_name()),
                "expected",
                format!(
                    "vector expects {} read-outs, harness binds {}",
                    vector.expected.len(),
                    self.outputs.len()
                ),
            ));
        }

        // Accumulate incident power per picometre-quantized channel, one
        // accumulator per read-out group. Distinct excitations are mutually
        // incoherent carriers, so powers add, never amplitudes.
        let mut accumulated: Vec<BTreeMap<i64, (Scalar, Scalar)>> =
            vec![BTreeMap::new(); self.outputs.len()];
        for (port, &value) in self.input_ports.iter().zip(&vector.inputs) {
            let wavelength = self.table.encode(value);
            let solution = self.solver.excite(port, wavelength)?;
            for (group, acc) in self.outputs.iter().zip(accumulated.iter_mut()) {
                for tap in &group.taps {
                    for (carrier, p) in solution.channel_powers(&tap.instance, &tap.port) {
                        let entry = acc.entry(quantize_pm(carrier)).or_insert((carrier, 0.0));
                        entry.1 += p;
                    }
                }
            }
        }

        let mut decoded = Vec::with_capacity(self.outputs.len());
        let mut margins = Vec::with_capacity(self.outputs.len());
        let mut per_channel_power = Vec::with_capacity(self.outputs.len());
        let mut pass = true;
        for (acc, &expected) in accumulated.iter().zip(&vector.expected) {
            let powers: Vec<(Scalar, Scalar)> = acc.values().copied().collect();
            let (value, margin) = match self.policy {
                ReadoutPolicy::DominantChannel {
                    min_margin,
                    dark_floor,
                } => {
                    let (value, margin) = self.decode_dominant(&powers, dark_floor);
                    pass &= value == Some(expected) && margin >= min_margin;
                    (value, margin)
                }
                ReadoutPolicy::Balanced {
                    dark_threshold,
                    min_margin,
                } => {
                    let (value, margin) = self.decode_balanced(&powers, dark_threshold);
                    pass &= value == Some(expected) && margin >= min_margin;
                    (value, margin)
                }
            };
            decoded.push(value);
            margins.push(margin);
            per_channel_power.push(powers);
        }

        Ok(VectorOutcome {
            pass,
            decoded,
            margins,
            per_channel_power,
        })
    }

    fn decode_dominant(
        &self,
        powers: &[(Scalar, Scalar)],
        dark_floor: Scalar,
    ) -> (Option<Trit>, Scalar) {
        let mut best: Option<(Scalar, Scalar)> = None;
        let mut runner_up: Scalar = 0.0;
        for &(carrier, p) in powers {
            match best {
                Some((_, bp)) if p <= bp => runner_up = runner_up.max(p),
                _ => {
                    if let Some((_, bp)) = best {
                        runner_up = runner_up.max(bp);
                    }
                    best = Some((carrier, p));
                }
            }
        }
        match best {
            Some((carrier, p)) if p > dark_floor => {
                (self.table.decode(carrier), p / runner_up.max(dark_floor))
            }
            _ => (None, 0.0),
        }
    }

    fn decode_balanced(
        &self,
        powers: &[(Scalar, Scalar)],
        dark_threshold: Scalar,
    ) -> (Option<Trit>, Scalar) {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for &(carrier, p) in powers {
            match self.table.decode(carrier) {
                Some(Trit::Plus) => positive += p,
                Some(Trit::Minus) => negative += p,
                _ => {}
            }
        }
        let net: Scalar = positive - negative;
        if net.abs() <= dark_threshold {
            (Some(Trit::Zero), dark_threshold / net.abs().max(1e-30))
        } else if net > 0.0 {
            (Some(Trit::Plus), net / dark_threshold)
        } else {
            (Some(Trit::Minus), net.abs() / dark_threshold)
        }
    }
}

/// Runs a suite of test vectors, building a harness per vector.
///
/// Mixer parameter binding depends on the carriers a vector drives, so each
/// vector gets its circuit constructed (and calibration-bound) afresh; the
/// factory captures whatever is shared.
pub fn run_suite<F>(vectors: &[TestVector], mut build: F) -> Result<SuiteSummary, SimError>
where
    F: FnMut(&TestVector) -> Result<Harness, SimError>,
{
    let mut outcomes = Vec::with_capacity(vectors.len());
    let mut passed = 0;
    let mut failed = 0;
    let mut worst_case_margin = Scalar::INFINITY;
    for vector in vectors {
        let outcome = build(vector)?.run_test_vector(vector)?;
        if outcome.pass {
            passed += 1;
        } else {
            failed += 1;
        }
        worst_case_margin = worst_case_margin.min(outcome.worst_margin());
        outcomes.push(outcome);
    }
    Ok(SuiteSummary {
        passed,
        failed,
        worst_case_margin,
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_calibration() -> CalibrationTable {
        CalibrationTable::parse(
            "\
sfg_mixer 1064 1064 0.35 0.1
sfg_mixer 1064 1310 0.35 0.1
sfg_mixer 1064 1550 0.35 0.1
sfg_mixer 1310 1310 0.35 0.1
sfg_mixer 1310 1550 0.35 0.1
sfg_mixer 1550 1550 0.35 0.1
",
        )
        .unwrap()
    }

    fn product_policy() -> ReadoutPolicy {
        ReadoutPolicy::DominantChannel {
            min_margin: 10.0,
            dark_floor: 1.0e-6,
        }
    }

    fn sum_policy() -> ReadoutPolicy {
        ReadoutPolicy::Balanced {
            dark_threshold: 0.02,
            min_margin: 2.0,
        }
    }

    #[test]
    fn single_mixer_multiply_table_decodes_every_product() {
        let table = ChannelTable::reference();
        let cal = full_calibration();
        let vectors: Vec<TestVector> = Trit::ALL
            .into_iter()
            .flat_map(|x| {
                Trit::ALL
                    .into_iter()
                    .map(move |w| TestVector::new(vec![x, w], vec![x.product(w)]))
            })
            .collect();
        let summary = run_suite(&vectors, |v| {
            Harness::for_accumulator_row(
                &table,
                &cal,
                &[v.inputs[1]],
                &[v.inputs[0]],
                product_policy(),
            )
        })
        .expect("suite runs");
        assert_eq!(summary.passed, 9, "failures: {:?}", summary.outcomes);
        assert_eq!(summary.failed, 0);
        assert!(
            summary.worst_case_margin >= 10.0,
            "margin {} below discrimination threshold",
            summary.worst_case_margin
        );
    }

    #[test]
    fn known_matrix_vector_product_decodes() {
        use Trit::{Minus as M, Plus as P, Zero as Z};
        let table = ChannelTable::reference();
        let cal = full_calibration();
        let weights = vec![vec![P, Z, M], vec![Z, P, Z], vec![M, Z, P]];
        let inputs = [P, P, P];

        let harness =
            Harness::for_weight_chip(&table, &cal, &weights, &inputs, sum_policy()).unwrap();
        let mut driven = inputs.to_vec();
        driven.extend(weights.iter().flatten().copied());
        let outcome = harness
            .run_test_vector(&TestVector::new(driven, vec![Z, P, Z]))
            .unwrap();
        assert!(outcome.pass, "outcome: {outcome:?}");
        assert_eq!(
            outcome.decoded,
            vec![Some(Z), Some(P), Some(Z)],
            "per-channel power: {:?}",
            outcome.per_channel_power
        );
    }

    #[test]
    fn lone_weight_lights_only_its_row() {
        use Trit::{Plus as P, Zero as Z};
        let table = ChannelTable::reference();
        let cal = full_calibration();
        let weights = vec![vec![Z, Z], vec![P, Z]];
        let inputs = [P, P];

        let harness =
            Harness::for_weight_chip(&table, &cal, &weights, &inputs, sum_policy()).unwrap();
        let mut driven = inputs.to_vec();
        driven.extend(weights.iter().flatten().copied());
        let outcome = harness
            .run_test_vector(&TestVector::new(driven, vec![Z, P]))
            .unwrap();
        assert!(outcome.pass, "outcome: {outcome:?}");

        // The unweighted row's signed channels all sit below the dark
        // threshold: no cross-row light.
        let dark = 0.02;
        for &(carrier, p) in &outcome.per_channel_power[0] {
            if matches!(table.decode(carrier), Some(Trit::Plus | Trit::Minus)) {
                assert!(p < dark, "channel {carrier} nm reads {p} in a dark row");
            }
        }
    }

    #[test]
    fn mismatched_vector_shape_is_rejected() {
        let table = ChannelTable::reference();
        let cal = full_calibration();
        let harness = Harness::for_accumulator_row(
            &table,
            &cal,
            &[Trit::Plus],
            &[Trit::Plus],
            product_policy(),
        )
        .unwrap();
        let err = harness
            .run_test_vector(&TestVector::new(vec![Trit::Plus], vec![Trit::Plus]))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { .. }));
    }

    #[test]
    fn insufficient_margin_fails_the_vector() {
        // A margin requirement far above the demux isolation makes the same
        // physically-correct run fail its discrimination check.
        let table = ChannelTable::reference();
        let cal = full_calibration();
        let harness = Harness::for_accumulator_row(
            &table,
            &cal,
            &[Trit::Plus],
            &[Trit::Plus],
            ReadoutPolicy::DominantChannel {
                min_margin: 1.0e9,
                dark_floor: 1.0e-6,
            },
        )
        .unwrap();
        let outcome = harness
            .run_test_vector(&TestVector::new(
                vec![Trit::Plus, Trit::Plus],
                vec![Trit::Plus],
            ))
            .unwrap();
        assert!(!outcome.pass);
        assert_eq!(outcome.decoded, vec![Some(Trit::Plus)]);
    }
}
