pub struct DefaultsConfig {
    pub geometry_format: &'static str,
    pub qm_program: &'static str,
    pub spin_multiplicity: u32,
    pub constrained_optimization: bool,
    pub parallel_tasks: usize,
    pub cpus_per_task: usize,
    pub memory_per_task: usize,
    pub polling_interval: u64,
    pub density_lower: f64,
    pub density_upper: f64,
    pub tolerance: f64,
    pub relative_step: f64,
    pub zero_step: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            geometry_format: "xyz",
            qm_program: "gaussian",
            spin_multiplicity: 1,
            constrained_optimization: true,
            parallel_tasks: 1,
            cpus_per_task: 4,
            memory_per_task: 4000,
            polling_interval: 30,
            density_lower: 1.0e-4,
            density_upper: 1.0e-3,
            tolerance: 1.0e-5,
            relative_step: 0.05,
            zero_step: 0.05,
        }
    }
}
