//! Structural netlist builders: multiply cell, accumulator row, weight chip.
//!
//! Each level is a pure function of the level below plus an explicit
//! adjacency rule, mirroring how the physical layout tiles the chip. The
//! builders bind calibrated mixer parameters before netlist construction and
//! use the naming conventions the harness relies on (`cell{j}`, `row{r}`,
//! `det{k}`, external ports `x{j}` / `w{j}` / `w{r}_{j}`).

use crate::calibration::CalibrationTable;
use crate::channels::{ChannelTable, Trit};
use crate::components::{
    Demultiplexer, Detector, LinearDispersion, MziModulator, Splitter, SumFrequencyMixer,
    Waveguide,
};
use crate::errors::SimError;
use crate::math::Scalar;
use crate::netlist::{Netlist, NetlistBuilder};

/// Routing waveguide length inside a cell (µm).
const CELL_GUIDE_UM: Scalar = 500.0;
/// Routing waveguide propagation loss (dB/cm).
const CELL_GUIDE_LOSS_DB_PER_CM: Scalar = 2.0;
/// Modulator insertion loss (dB).
const MODULATOR_LOSS_DB: Scalar = 0.1;
/// Demultiplexer passband width (FWHM, nm).
const DEMUX_FWHM_NM: Scalar = 2.0;
/// Demultiplexer cross-channel isolation (dB).
const DEMUX_ISOLATION_DB: Scalar = 30.0;

/// Effective-index model spanning every carrier a chip run can produce,
/// pump bands and sum-frequency products alike.
fn routing_index() -> Result<LinearDispersion, SimError> {
    LinearDispersion::new(2.0, -2.0e-5, 1310.0, (450.0, 1800.0))
}

fn routing_guide() -> Result<Waveguide, SimError> {
    Waveguide::new(CELL_GUIDE_UM, CELL_GUIDE_LOSS_DB_PER_CM, routing_index()?)
}

/// Builds one ternary multiply cell.
///
/// Two input arms (waveguide + bar-state modulator) feed a sum-frequency
/// mixer bound to the carrier pair encoding `(x, w)`; unconverted residues
/// terminate on absorbers inside the cell. External ports: `x_in`, `w_in`,
/// `out` (the mixer product).
pub fn multiply_cell(
    name: impl Into<String>,
    table: &ChannelTable,
    calibration: &CalibrationTable,
    x: Trit,
    w: Trit,
) -> Result<Netlist, SimError> {
    let lambda_x = table.encode(x);
    let lambda_w = table.encode(w);
    let mixer = SumFrequencyMixer::from_calibration(calibration, lambda_x, lambda_w)?;

    let mut b = NetlistBuilder::new(name);
    b.add_primitive("wg_x", routing_guide()?);
    b.add_primitive("wg_w", routing_guide()?);
    b.add_primitive("mod_x", MziModulator::bar(MODULATOR_LOSS_DB)?);
    b.add_primitive("mod_w", MziModulator::bar(MODULATOR_LOSS_DB)?);
    b.add_primitive("mix", mixer);
    b.add_primitive("term_a", Detector::ideal());
    b.add_primitive("term_b", Detector::ideal());

    b.connect("wg_x", "out", "mod_x", "in");
    b.connect("mod_x", "out", "mix", "a");
    b.connect("wg_w", "out", "mod_w", "in");
    b.connect("mod_w", "out", "mix", "b");
    b.connect("mix", "thru_a", "term_a", "in");
    b.connect("mix", "thru_b", "term_b", "in");

    b.expose("x_in", "wg_x", "in");
    b.expose("w_in", "wg_w", "in");
    b.expose("out", "mix", "sfg");
    b.build()
}

/// Builds one accumulator row of `weights.len()` multiply cells.
///
/// Adjacency rule: cell `j`'s product couples onto a shared bus combiner,
/// the bus feeds a product-channel demultiplexer, and demux output `k`
/// terminates on detector `det{k}` — one detector per derived channel of
/// `table`, in `output_channels()` order. External ports: `x{j}`, `w{j}`.
pub fn accumulator_row(
    name: impl Into<String>,
    table: &ChannelTable,
    calibration: &CalibrationTable,
    weights: &[Trit],
    inputs: &[Trit],
) -> Result<Netlist, SimError> {
    let name = name.into();
    if weights.is_empty() || weights.len() != inputs.len() {
        return Err(SimError::invalid_parameter(
            format!("row `{name}`"),
            "weights",
            format!(
                "weight count {} must match input count {} and be non-empty",
                weights.len(),
                inputs.len()
            ),
        ));
    }

    let grid: Vec<Scalar> = table
        .output_channels()
        .iter()
        .map(|c| c.wavelength_nm)
        .collect();

    let mut b = NetlistBuilder::new(name.clone());
    for (j, (&w, &x)) in weights.iter().zip(inputs).enumerate() {
        let cell = multiply_cell(format!("{name}_cell{j}"), table, calibration, x, w)?;
        b.add_subcircuit(format!("cell{j}"), cell);
    }
    b.add_primitive("bus", Splitter::new(weights.len(), 0.0)?);
    b.add_primitive(
        "demux",
        Demultiplexer::new(grid.clone(), DEMUX_FWHM_NM, DEMUX_ISOLATION_DB)?,
    );
    for k in 0..grid.len() {
        b.add_primitive(format!("det{k}"), Detector::ideal());
    }

    for j in 0..weights.len() {
        b.connect(format!("cell{j}"), "out", "bus", format!("out{j}"));
        b.expose(format!("x{j}"), format!("cell{j}"), "x_in");
        b.expose(format!("w{j}"), format!("cell{j}"), "w_in");
    }
    b.connect("bus", "in", "demux", "in");
    for k in 0..grid.len() {
        b.connect("demux", format!("out{k}"), format!("det{k}"), "in");
    }
    b.build()
}

/// Builds a full `weights.len() × inputs.len()` weight chip.
///
/// Adjacency rule: input `x{j}` fans out through an explicit 1×R splitter to
/// cell `j` of every row; weight ports stay per-row. External ports: `x{j}`
/// and `w{r}_{j}`. Row `r`'s detectors sit at `row{r}.det{k}` after
/// flattening.
pub fn weight_chip(
    name: impl Into<String>,
    table: &ChannelTable,
    calibration: &CalibrationTable,
    weights: &[Vec<Trit>],
    inputs: &[Trit],
) -> Result<Netlist, SimError> {
    let name = name.into();
    if weights.is_empty() {
        return Err(SimError::invalid_parameter(
            format!("chip `{name}`"),
            "weights",
            "at least one row is required",
        ));
    }
    let rows = weights.len();
    let cols = inputs.len();

    let mut b = NetlistBuilder::new(name.clone());
    for (r, row_weights) in weights.iter().enumerate() {
        if row_weights.len() != cols {
            return Err(SimError::invalid_parameter(
                format!("chip `{name}`"),
                "weights",
                format!("row {r} has {} weights, expected {cols}", row_weights.len()),
            ));
        }
        let row = accumulator_row(format!("{name}_row{r}"), table, calibration, row_weights, inputs)?;
        b.add_subcircuit(format!("row{r}"), row);
    }
    for j in 0..cols {
        b.add_primitive(format!("xsplit{j}"), Splitter::new(rows, 0.0)?);
        b.expose(format!("x{j}"), format!("xsplit{j}"), "in");
        for r in 0..rows {
            b.connect(format!("xsplit{j}"), format!("out{r}"), format!("row{r}"), format!("x{j}"));
        }
    }
    for r in 0..rows {
        for j in 0..cols {
            b.expose(format!("w{r}_{j}"), format!("row{r}"), format!("w{j}"));
        }
    }
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;

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

    #[test]
    fn cell_exposes_inputs_and_product() {
        let table = ChannelTable::reference();
        let cell =
            multiply_cell("cell", &table, &full_calibration(), Trit::Plus, Trit::Minus).unwrap();
        let ports: Vec<&str> = cell.ports().keys().map(String::as_str).collect();
        assert_eq!(ports, ["out", "w_in", "x_in"]);
    }

    #[test]
    fn uncalibrated_cell_construction_fails_early() {
        let table = ChannelTable::reference();
        let empty = CalibrationTable::new();
        let err = multiply_cell("cell", &table, &empty, Trit::Plus, Trit::Plus).unwrap_err();
        assert!(matches!(err, SimError::MissingCalibration { .. }));
    }

    #[test]
    fn row_flattens_to_hierarchical_detector_paths() {
        let table = ChannelTable::reference();
        let row = accumulator_row(
            "row",
            &table,
            &full_calibration(),
            &[Trit::Plus, Trit::Zero],
            &[Trit::Plus, Trit::Minus],
        )
        .unwrap();
        let flat = flatten(&row).unwrap();
        assert!(flat.instances().contains_key("det0"));
        assert!(flat.instances().contains_key("cell0.mix"));
        assert!(flat.instances().contains_key("cell1.wg_w"));
        // One external port per logical input on each side.
        assert_eq!(flat.ports().len(), 4);
    }

    #[test]
    fn mismatched_row_shape_is_rejected() {
        let table = ChannelTable::reference();
        let err = accumulator_row(
            "row",
            &table,
            &full_calibration(),
            &[Trit::Plus],
            &[Trit::Plus, Trit::Minus],
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { .. }));
    }

    #[test]
    fn chip_wires_every_input_to_every_row() {
        let table = ChannelTable::reference();
        let weights = vec![
            vec![Trit::Plus, Trit::Zero],
            vec![Trit::Minus, Trit::Plus],
        ];
        let chip = weight_chip(
            "chip",
            &table,
            &full_calibration(),
            &weights,
            &[Trit::Plus, Trit::Plus],
        )
        .unwrap();
        let flat = flatten(&chip).unwrap();
        assert!(flat.instances().contains_key("row0.cell0.mix"));
        assert!(flat.instances().contains_key("row1.det5"));
        assert!(flat.ports().contains_key("x1"));
        assert!(flat.ports().contains_key("w1_0"));
    }
}
