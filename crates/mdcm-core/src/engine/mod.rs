//! # Engine Module
//!
//! The stateful scan layer. It turns a [`config::ScanConfig`] into scan points,
//! builds and runs one QM job per point, and records and aggregates the results.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Scan options, builder and TOML persistence
//! - **Enumeration** ([`grid`]) - Index-synchronized stepping of the scanned coordinates
//! - **Jobs** ([`job`], [`backend`]) - Job descriptors and the backend that runs them
//! - **Scheduling** ([`scheduler`]) - The bounded polling loop over outstanding jobs
//! - **Results** ([`store`], [`evaluator`]) - Per-point state and aggregated sequences
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Scan-level error type

pub mod backend;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod grid;
pub mod job;
pub mod progress;
pub mod scheduler;
pub mod store;
