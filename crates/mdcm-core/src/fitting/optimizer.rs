use super::error::FitError;
use crate::core::models::charge::SITE_STRIDE;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{debug, info};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Box limits applied to trial vectors. Never active unless configured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBounds {
    pub position: (f64, f64),
    pub charge: (f64, f64),
}

impl ParameterBounds {
    pub fn clamp(&self, vector: &mut [f64]) {
        for (i, value) in vector.iter_mut().enumerate() {
            let (lo, hi) = if i % SITE_STRIDE == SITE_STRIDE - 1 {
                self.charge
            } else {
                self.position
            };
            *value = value.clamp(lo, hi);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Convergence threshold on both the residual spread and the simplex size.
    pub tolerance: f64,
    /// Defaults to `200 * n` for `n` parameters.
    pub max_iterations: Option<usize>,
    pub max_evaluations: Option<usize>,
    /// Relative size of the initial simplex along non-zero parameters.
    pub relative_step: f64,
    /// Absolute size of the initial simplex along zero parameters.
    pub zero_step: f64,
    pub bounds: Option<ParameterBounds>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: None,
            max_evaluations: None,
            relative_step: 0.05,
            zero_step: 0.05,
            bounds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Best vector found, with the total-charge correction applied.
    pub parameters: Vec<f64>,
    pub residual: f64,
    pub converged: bool,
    pub iterations: usize,
    pub evaluations: usize,
    pub message: String,
}

/// Moves the whole total-charge deficit onto the last charge of `vector`.
///
/// Charges are every [`SITE_STRIDE`]-th entry starting at index 3. Vectors
/// without any charge are left untouched.
pub fn apply_charge_conservation(vector: &mut [f64], total_charge: f64) {
    let sum: f64 = vector
        .iter()
        .skip(SITE_STRIDE - 1)
        .step_by(SITE_STRIDE)
        .sum();
    let count = vector.len() / SITE_STRIDE;
    if count == 0 {
        return;
    }
    vector[count * SITE_STRIDE - 1] += total_charge - sum;
}

/// Nelder-Mead minimizer over a flat charge-site vector with the
/// total-charge correction applied before every evaluation.
#[derive(Debug, Clone)]
pub struct ConstrainedOptimizer {
    pub config: OptimizerConfig,
    pub total_charge: f64,
}

struct Vertex {
    point: Vec<f64>,
    value: f64,
}

impl ConstrainedOptimizer {
    pub fn new(config: OptimizerConfig, total_charge: f64) -> Self {
        Self {
            config,
            total_charge,
        }
    }

    fn project(&self, mut trial: Vec<f64>) -> Vec<f64> {
        if let Some(bounds) = &self.config.bounds {
            bounds.clamp(&mut trial);
        }
        apply_charge_conservation(&mut trial, self.total_charge);
        trial
    }

    /// Minimizes `objective` starting from `initial`.
    ///
    /// Objective errors abort the run. Running out of iterations or
    /// evaluations is reported through [`OptimizationResult::converged`].
    pub fn minimize<F>(
        &self,
        initial: &[f64],
        mut objective: F,
        reporter: &ProgressReporter,
    ) -> Result<OptimizationResult, FitError>
    where
        F: FnMut(&[f64]) -> Result<f64, FitError>,
    {
        let n = initial.len();
        if n == 0 {
            return Err(FitError::Dimension("cannot optimize an empty vector".into()));
        }
        let max_iterations = self.config.max_iterations.unwrap_or(200 * n);
        let max_evaluations = self.config.max_evaluations.unwrap_or(usize::MAX);
        let tol = self.config.tolerance;

        let mut evaluations = 0usize;
        let mut evaluate = |point: Vec<f64>, count: &mut usize| -> Result<Vertex, FitError> {
            let point = self.project(point);
            let value = objective(&point)?;
            *count += 1;
            Ok(Vertex { point, value })
        };

        let mut simplex = Vec::with_capacity(n + 1);
        simplex.push(evaluate(initial.to_vec(), &mut evaluations)?);
        for i in 0..n {
            let mut point = initial.to_vec();
            point[i] = if point[i] != 0.0 {
                point[i] * (1.0 + self.config.relative_step)
            } else {
                self.config.zero_step
            };
            simplex.push(evaluate(point, &mut evaluations)?);
        }

        let mut iterations = 0usize;
        let mut converged = false;
        let mut message = String::from("Maximum number of iterations reached.");

        loop {
            simplex.sort_by(|a, b| a.value.total_cmp(&b.value));

            let best = &simplex[0];
            let f_spread = simplex.iter().map(|v| (v.value - best.value).abs()).fold(0.0, f64::max);
            let x_spread = simplex
                .iter()
                .flat_map(|v| v.point.iter().zip(&best.point).map(|(a, b)| (a - b).abs()))
                .fold(0.0, f64::max);
            if f_spread <= tol && x_spread <= tol {
                converged = true;
                message = "Optimization converged.".into();
                break;
            }
            if iterations >= max_iterations {
                break;
            }
            if evaluations >= max_evaluations {
                message = "Maximum number of function evaluations reached.".into();
                break;
            }

            iterations += 1;
            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|v| v.point[j]).sum::<f64>() / n as f64)
                .collect();
            let worst_value = simplex[n].value;
            let second_worst = simplex[n - 1].value;
            let along = |coef: f64, worst: &[f64]| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(worst)
                    .map(|(c, w)| c + coef * (c - w))
                    .collect()
            };

            let reflected = evaluate(along(REFLECTION, &simplex[n].point), &mut evaluations)?;
            if reflected.value < simplex[0].value {
                let expanded = evaluate(along(EXPANSION, &simplex[n].point), &mut evaluations)?;
                simplex[n] = if expanded.value < reflected.value {
                    expanded
                } else {
                    reflected
                };
            } else if reflected.value < second_worst {
                simplex[n] = reflected;
            } else {
                let outside = reflected.value < worst_value;
                let contracted = if outside {
                    evaluate(along(CONTRACTION, &simplex[n].point), &mut evaluations)?
                } else {
                    evaluate(along(-CONTRACTION, &simplex[n].point), &mut evaluations)?
                };
                let threshold = if outside { reflected.value } else { worst_value };
                if contracted.value < threshold {
                    simplex[n] = contracted;
                } else {
                    let best_point = simplex[0].point.clone();
                    for vertex in simplex.iter_mut().skip(1) {
                        let shrunk: Vec<f64> = best_point
                            .iter()
                            .zip(&vertex.point)
                            .map(|(b, p)| b + SHRINK * (p - b))
                            .collect();
                        *vertex = evaluate(shrunk, &mut evaluations)?;
                    }
                }
            }

            let best_value = simplex
                .iter()
                .map(|v| v.value)
                .fold(f64::INFINITY, f64::min);
            debug!(iteration = iterations, residual = best_value, "Simplex step.");
            reporter.report(Progress::Iteration {
                iteration: iterations,
                residual: best_value,
            });
        }

        simplex.sort_by(|a, b| a.value.total_cmp(&b.value));
        let best = simplex.swap_remove(0);
        info!(
            converged,
            iterations,
            evaluations,
            residual = best.value,
            "{}",
            message
        );
        Ok(OptimizationResult {
            parameters: best.point,
            residual: best.value,
            converged,
            iterations,
            evaluations,
            message,
        })
    }
}
