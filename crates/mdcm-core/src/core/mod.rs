//! # Core Module
//!
//! The stateless foundation of the library: molecular and charge-site data
//! models, geometry utilities, file formats and the point-charge potential
//! kernel.
//!
//! - **Data Models** ([`models`]) - Molecules, internal coordinates, charge sites
//! - **File I/O** ([`io`]) - XYZ geometries, Gaussian cube grids, charge model files
//! - **Electrostatics** ([`electrostatics`]) - Unit constants and the ESP kernel
//! - **Utilities** ([`utils`]) - Geometry helpers and the element table

pub mod electrostatics;
pub mod io;
pub mod models;
pub mod utils;
