use super::defaults::DefaultsConfig;
use super::file::{FileFitConfig, FileOptimizerConfig, FileScanConfig};
use super::models::{FitAppConfig, ScanAppConfig};
use crate::cli::{FitArgs, ScanArgs};
use crate::error::{CliError, Result};
use mdcm::core::models::coordinate::InternalCoordinate;
use mdcm::engine::config::{GeometryFormat, QmProgram, ScanConfigBuilder};
use mdcm::fitting::dataset::MaskConfig;
use mdcm::fitting::optimizer::{OptimizerConfig, ParameterBounds};
use mdcm::workflows::fit::FitConfig;
use std::path::PathBuf;
use std::str::FromStr;

/// Merges CLI flags, `--set` values, the config file and built-in defaults,
/// in that order of precedence, into a validated scan configuration.
pub fn build_scan_config(args: &ScanArgs) -> Result<ScanAppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileScanConfig::from_file(&args.config)?;
    let file_config = apply_scan_set_values(file_config, &args.set_values)?;

    let dofs = file_config
        .dofs
        .unwrap_or_default()
        .iter()
        .map(|atoms| InternalCoordinate::from_atoms(atoms))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CliError::Config(e.to_string()))?;
    let geometry_format = GeometryFormat::from_str(
        file_config
            .geometry_format
            .as_deref()
            .unwrap_or(defaults.geometry_format),
    )
    .map_err(|e| CliError::Config(e.to_string()))?;
    let qm_program = QmProgram::from_str(
        file_config
            .qm_program
            .as_deref()
            .unwrap_or(defaults.qm_program),
    )
    .map_err(|e| CliError::Config(e.to_string()))?;

    let mut builder = ScanConfigBuilder::new()
        .geometry_format(geometry_format)
        .qm_program(qm_program)
        .dofs(dofs)
        .total_charge(required(file_config.total_charge, "total-charge")?)
        .spin_multiplicity(
            file_config
                .spin_multiplicity
                .unwrap_or(defaults.spin_multiplicity),
        )
        .constrained_optimization(
            file_config
                .constrained_optimization
                .unwrap_or(defaults.constrained_optimization),
        )
        .parallel_tasks(
            args.parallel_tasks
                .or(file_config.parallel_tasks)
                .unwrap_or(defaults.parallel_tasks),
        )
        .cpus_per_task(file_config.cpus_per_task.unwrap_or(defaults.cpus_per_task))
        .memory_per_task(
            file_config
                .memory_per_task
                .unwrap_or(defaults.memory_per_task),
        )
        .polling_interval(
            file_config
                .polling_interval
                .unwrap_or(defaults.polling_interval),
        )
        .overwrite(args.overwrite || file_config.overwrite.unwrap_or(false));

    if let Some(label) = &file_config.label {
        builder = builder.label(label);
    }
    if let Some(path) = file_config.geometry_file {
        builder = builder.geometry_file(path);
    }
    if let Some(steps) = file_config.steps {
        builder = builder.steps(steps);
    }
    if let Some(method) = &file_config.qm_method {
        builder = builder.qm_method(method);
    }
    if let Some(basis) = &file_config.qm_basis_set {
        builder = builder.qm_basis_set(basis);
    }
    if let Some(executable) = &file_config.qm_executable {
        builder = builder.qm_executable(executable);
    }
    if let Some(dir) = args
        .working_directory
        .clone()
        .or(file_config.working_directory)
    {
        builder = builder.working_directory(dir);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(ScanAppConfig {
        core_config,
        prepare_only: args.prepare_only,
    })
}

/// Builds the fit configuration. Cube lists may stay empty when a scan
/// configuration is named as their source.
pub fn build_fit_config(args: &FitArgs) -> Result<FitAppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = match &args.config {
        Some(path) => FileFitConfig::from_file(path)?,
        None => FileFitConfig::default(),
    };
    let mut file_config = apply_fit_set_values(file_config, &args.set_values)?;

    let (esp_files, density_files, scan_config) =
        if !args.esp_files.is_empty() || !args.density_files.is_empty() {
            (args.esp_files.clone(), args.density_files.clone(), None)
        } else if args.scan_config.is_some() {
            (Vec::new(), Vec::new(), args.scan_config.clone())
        } else {
            let esp = file_config.esp_files.take().unwrap_or_default();
            let dens = file_config.density_files.take().unwrap_or_default();
            let scan = if esp.is_empty() && dens.is_empty() {
                file_config.scan_config.take()
            } else {
                None
            };
            (esp, dens, scan)
        };
    if esp_files.is_empty() && density_files.is_empty() && scan_config.is_none() {
        return Err(CliError::Config(
            "No reference cube files: give --esp/--dens or --scan-config".to_string(),
        ));
    }

    let local_model = required(
        args.local_model.clone().or(file_config.local_model.take()),
        "local-model",
    )?;
    let replication_model = required(
        args.replication_model
            .clone()
            .or(file_config.replication_model.take()),
        "replication-model",
    )?;
    let total_charge = required(
        args.total_charge.or(file_config.total_charge),
        "total-charge",
    )?;
    let weights = if args.weights.is_empty() {
        file_config.weights.take()
    } else {
        Some(args.weights.clone())
    };

    let mask_file = file_config.mask.take().unwrap_or_default();
    let mask = MaskConfig {
        density_lower: mask_file.density_lower.unwrap_or(defaults.density_lower),
        density_upper: mask_file.density_upper.unwrap_or(defaults.density_upper),
    };
    if mask.density_lower > mask.density_upper {
        return Err(CliError::Config(format!(
            "Density mask lower bound {} exceeds upper bound {}",
            mask.density_lower, mask.density_upper
        )));
    }

    let mut optimizer = merge_optimizer(file_config.optimizer.take(), &defaults);
    if let Some(tolerance) = args.tolerance {
        optimizer.tolerance = tolerance;
    }
    if let Some(max_iterations) = args.max_iterations {
        optimizer.max_iterations = Some(max_iterations);
    }

    Ok(FitAppConfig {
        core_config: FitConfig {
            esp_files,
            density_files,
            local_model,
            replication_model,
            total_charge,
            weights,
            mask,
            optimizer,
            output_local: args.output_local.clone().or(file_config.output_local),
            output_global: args.output_global.clone().or(file_config.output_global),
            write_cubes: args.write_cubes || file_config.write_cubes.unwrap_or(false),
        },
        scan_config,
    })
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| CliError::Config(format!("Missing required setting `{}`", key)))
}

fn merge_optimizer(file_val: Option<FileOptimizerConfig>, defaults: &DefaultsConfig) -> OptimizerConfig {
    let file_val = file_val.unwrap_or_default();
    let bounds = file_val.bounds.map(|b| {
        let open = [f64::NEG_INFINITY, f64::INFINITY];
        let position = b.position.unwrap_or(open);
        let charge = b.charge.unwrap_or(open);
        ParameterBounds {
            position: (position[0], position[1]),
            charge: (charge[0], charge[1]),
        }
    });
    OptimizerConfig {
        tolerance: file_val.tolerance.unwrap_or(defaults.tolerance),
        max_iterations: file_val.max_iterations,
        max_evaluations: file_val.max_evaluations,
        relative_step: file_val.relative_step.unwrap_or(defaults.relative_step),
        zero_step: file_val.zero_step.unwrap_or(defaults.zero_step),
        bounds,
    }
}

fn split_set_value(kv_pair: &str) -> Result<(&str, &str)> {
    kv_pair.split_once('=').ok_or_else(|| {
        CliError::Config(format!(
            "Invalid --set format: '{}'. Expected KEY=VALUE.",
            kv_pair
        ))
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            std::any::type_name::<T>(),
            key,
            value
        ))
    })
}

fn unsupported_key(key: &str) -> CliError {
    CliError::Config(format!(
        "Unsupported configuration key for --set: '{}'",
        key
    ))
}

fn apply_scan_set_values(mut config: FileScanConfig, set_values: &[String]) -> Result<FileScanConfig> {
    for kv_pair in set_values {
        let (key, value) = split_set_value(kv_pair)?;
        match key {
            "label" => config.label = Some(value.to_string()),
            "geometry-file" => config.geometry_file = Some(PathBuf::from(value)),
            "qm-method" => config.qm_method = Some(value.to_string()),
            "qm-basis-set" => config.qm_basis_set = Some(value.to_string()),
            "qm-executable" => config.qm_executable = Some(value.to_string()),
            "working-directory" => config.working_directory = Some(PathBuf::from(value)),
            "total-charge" => config.total_charge = Some(parse_value(key, value)?),
            "spin-multiplicity" => config.spin_multiplicity = Some(parse_value(key, value)?),
            "constrained-optimization" => {
                config.constrained_optimization = Some(parse_value(key, value)?)
            }
            "parallel-tasks" => config.parallel_tasks = Some(parse_value(key, value)?),
            "cpus-per-task" => config.cpus_per_task = Some(parse_value(key, value)?),
            "memory-per-task" => config.memory_per_task = Some(parse_value(key, value)?),
            "polling-interval" => config.polling_interval = Some(parse_value(key, value)?),
            "overwrite" => config.overwrite = Some(parse_value(key, value)?),
            _ => return Err(unsupported_key(key)),
        }
    }
    Ok(config)
}

fn apply_fit_set_values(mut config: FileFitConfig, set_values: &[String]) -> Result<FileFitConfig> {
    for kv_pair in set_values {
        let (key, value) = split_set_value(kv_pair)?;
        match key {
            "total-charge" => config.total_charge = Some(parse_value(key, value)?),
            "write-cubes" => config.write_cubes = Some(parse_value(key, value)?),
            "mask.density-lower" => {
                config
                    .mask
                    .get_or_insert_with(Default::default)
                    .density_lower = Some(parse_value(key, value)?);
            }
            "mask.density-upper" => {
                config
                    .mask
                    .get_or_insert_with(Default::default)
                    .density_upper = Some(parse_value(key, value)?);
            }
            "optimizer.tolerance" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .tolerance = Some(parse_value(key, value)?);
            }
            "optimizer.max-iterations" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse_value(key, value)?);
            }
            "optimizer.max-evaluations" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .max_evaluations = Some(parse_value(key, value)?);
            }
            "optimizer.relative-step" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .relative_step = Some(parse_value(key, value)?);
            }
            _ => return Err(unsupported_key(key)),
        }
    }
    Ok(config)
}
