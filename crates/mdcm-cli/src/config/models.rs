use mdcm::engine::config::ScanConfig;
use mdcm::workflows::fit::FitConfig;
use std::path::PathBuf;

#[derive(Debug)]
pub struct ScanAppConfig {
    pub core_config: ScanConfig,
    pub prepare_only: bool,
}

#[derive(Debug)]
pub struct FitAppConfig {
    pub core_config: FitConfig,
    /// Persisted scan configuration whose finished points supply the cube
    /// files when none were given explicitly.
    pub scan_config: Option<PathBuf>,
}
