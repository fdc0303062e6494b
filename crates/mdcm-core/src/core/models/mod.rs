//! # Core Models Module
//!
//! Plain data structures shared by the scan and fitting layers.
//!
//! - [`molecule`] - Atoms with element identity and Cartesian positions
//! - [`coordinate`] - Scanned internal coordinates (bond, angle, dihedral)
//! - [`charge`] - Charge sites, flat parameter vectors and replication definitions

pub mod charge;
pub mod coordinate;
pub mod molecule;
