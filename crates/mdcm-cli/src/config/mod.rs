mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_fit_config, build_scan_config};
pub use models::{FitAppConfig, ScanAppConfig};
