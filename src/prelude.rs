//! Convenience re-exports for building simulation experiments.

pub use crate::builder::{accumulator_row, multiply_cell, weight_chip};
pub use crate::calibration::{CalibrationRecord, CalibrationTable};
pub use crate::channels::{sum_frequency, ChannelTable, OutputChannel, Trit};
pub use crate::components::{
    Bend, Combiner, ComponentModel, Demultiplexer, Detector, DispersionModel, LinearDispersion,
    MziModulator, SMap, Splitter, SumFrequencyMixer, Transfer, Waveguide,
};
pub use crate::constants::{db_to_amplitude, frequency_thz, SPEED_OF_LIGHT};
pub use crate::errors::SimError;
pub use crate::flatten::{flatten, FlattenedCircuit};
pub use crate::harness::{
    run_suite, Harness, ReadoutGroup, ReadoutPolicy, SuiteSummary, TestVector, VectorOutcome,
};
pub use crate::math::{phasor, CScalar, Scalar};
pub use crate::netlist::{Connection, Endpoint, ModelRef, Netlist, NetlistBuilder};
pub use crate::solver::{Solution, Solver};
pub use crate::sweep::{mag, mag_db, phase_rad, sweep_map, wavelength_linspace};
