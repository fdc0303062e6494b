//! Point-charge electrostatics: physical constants and the potential kernel
//! used to evaluate a charge model on a sampling grid.

pub mod potential;
pub mod units;
