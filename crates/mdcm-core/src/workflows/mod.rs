//! # Workflows Module
//!
//! The user-facing entry points of the library.
//!
//! - **Scan Workflow** ([`scan`]) - Initializes, prepares, executes and evaluates
//!   a PES scan through a [`crate::engine::backend::QmBackend`].
//! - **Fit Workflow** ([`fit`]) - Loads reference cubes and a charge model,
//!   optimizes the local charge sites and writes the fitted model.

pub mod fit;
pub mod scan;
