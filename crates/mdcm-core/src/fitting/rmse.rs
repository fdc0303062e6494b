use super::dataset::{CubeDataset, ReferenceCube};
use super::error::FitError;
use super::model::ChargeModel;
use crate::core::electrostatics::potential::{PointCharge, potential_at};
use crate::core::electrostatics::units::HARTREE_TO_KCAL_MOL;

/// Root-mean-square deviation between the model potential and the reference
/// potential over the masked points of one file, in kcal/(mol e).
pub fn file_rmse(cube: &ReferenceCube, charges: &[PointCharge]) -> f64 {
    let sum_sq: f64 = cube
        .points
        .iter()
        .zip(&cube.values)
        .map(|(point, reference)| {
            let diff = potential_at(charges, point) - reference;
            diff * diff
        })
        .sum();
    (sum_sq / cube.points.len() as f64).sqrt() * HARTREE_TO_KCAL_MOL
}

/// Per-file RMSE of the local vector `local`, in dataset order.
pub fn rmse_each(dataset: &CubeDataset, model: &ChargeModel, local: &[f64]) -> Result<Vec<f64>, FitError> {
    if dataset.is_empty() {
        return Err(FitError::NotLoaded("cube file"));
    }
    dataset
        .entries()
        .iter()
        .map(|cube| -> Result<f64, FitError> {
            let charges = model.point_charges(local, &cube.molecule)?;
            Ok(file_rmse(cube, &charges))
        })
        .collect()
}

/// Unweighted mean of [`rmse_each`].
pub fn rmse(dataset: &CubeDataset, model: &ChargeModel, local: &[f64]) -> Result<f64, FitError> {
    let each = rmse_each(dataset, model, local)?;
    Ok(each.iter().sum::<f64>() / each.len() as f64)
}

/// Weighted mean of [`rmse_each`]: `sum(w_i * r_i) / sum(w_i)`.
pub fn rmse_weighted(
    dataset: &CubeDataset,
    model: &ChargeModel,
    local: &[f64],
    weights: &[f64],
) -> Result<f64, FitError> {
    if weights.len() != dataset.len() {
        return Err(FitError::Dimension(format!(
            "{} weights for {} cube files",
            weights.len(),
            dataset.len()
        )));
    }
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return Err(FitError::Dimension("weights sum to zero".into()));
    }
    let each = rmse_each(dataset, model, local)?;
    Ok(each.iter().zip(weights).map(|(r, w)| w * r).sum::<f64>() / total)
}
