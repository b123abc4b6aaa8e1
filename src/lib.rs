#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(clippy::all, clippy::cargo, clippy::nursery, missing_docs)]
#![doc = include_str!("../README.md")]

/// Physical constants and wavelength/loss unit helpers.
pub mod constants;
/// Shared numerical primitives (scalar aliases, phasors, power helpers).
pub mod math;
/// Logical values, carrier channels, and sum-frequency arithmetic.
pub mod channels;
/// Calibration records for nonlinear elements.
pub mod calibration;
/// Compact scattering models for the physical element library.
pub mod components;
/// Hierarchical netlists with construction-time validation.
pub mod netlist;
/// Structural netlist builders (cell, row, chip).
pub mod builder;
/// Flattening of hierarchical netlists into flat circuits.
pub mod flatten;
/// Frequency-domain scattering solver.
pub mod solver;
/// Logic-level test harness and comparator.
pub mod harness;
/// Wavelength sweep builders and post-processing helpers.
pub mod sweep;
/// Error types shared between submodules.
pub mod errors;

/// Common exports for downstream crates.
pub mod prelude;
