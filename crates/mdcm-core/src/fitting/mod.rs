//! # Fitting Module
//!
//! The charge-model fitting layer. A [`session::FittingSession`] owns the
//! reference cube data ([`dataset`]) and the [`model::ChargeModel`]; residuals
//! are computed by the pure functions in [`rmse`] and minimized by the
//! Nelder-Mead [`optimizer`] under a total-charge constraint.
//!
//! All computation in this layer is single-threaded and deterministic.

pub mod dataset;
pub mod error;
pub mod model;
pub mod optimizer;
pub mod rmse;
pub mod session;
