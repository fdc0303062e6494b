//! # MDCM Core Library
//!
//! Scan orchestration and distributed charge model fitting for molecular
//! electrostatics.
//!
//! ## Architectural Philosophy
//!
//! The library keeps a layered structure with a clear separation of concerns.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Molecule`,
//!   `InternalCoordinate`, `ChargeSite`), geometry helpers, the XYZ, cube and
//!   charge model file formats, and the point-charge potential kernel.
//!
//! - **[`engine`]: The Scan Layer.** Scan configuration, index-synchronized
//!   enumeration of scan points, QM job descriptors and backends, the bounded
//!   polling scheduler, the resumable result store and the evaluator.
//!
//! - **[`fitting`]: The Fitting Layer.** The charge model with its replication
//!   onto the molecule, reference cube data, RMSE evaluation and the
//!   charge-conserving Nelder-Mead optimizer, owned by a `FittingSession`.
//!
//! - **[`workflows`]: The Public API.** `Scan` drives a complete PES scan and
//!   `fit::run` performs a complete charge model fit.

pub mod core;
pub mod engine;
pub mod fitting;
pub mod workflows;
