//! Provides input/output functionality for the file formats used by scans and fits.
//!
//! All formats implement the [`traits::FormatFile`] trait: molecular geometries
//! ([`xyz`]), volumetric grids ([`cube`]) and charge model records ([`dcm`]).

pub mod cube;
pub mod dcm;
pub mod traits;
pub mod xyz;
