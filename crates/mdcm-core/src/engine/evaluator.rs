use super::error::EngineError;
use super::store::{PointStatus, ScanResultStore};
use crate::core::models::coordinate::InternalCoordinate;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Energies and artifacts of a scan, one entry per point in step order.
///
/// Entries of failed or unfinished points are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanEvaluation {
    pub energies: Vec<Option<f64>>,
    pub esp_cubes: Vec<Option<PathBuf>>,
    pub density_cubes: Vec<Option<PathBuf>>,
}

impl ScanEvaluation {
    pub fn lowest_energy_index(&self) -> Option<usize> {
        lowest_energy_index(&self.energies)
    }

    /// ESP and density cube pairs of every successful point, in step order.
    pub fn cube_pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        self.esp_cubes
            .iter()
            .zip(&self.density_cubes)
            .filter_map(|(esp, dens)| Some((esp.clone()?, dens.clone()?)))
            .collect()
    }
}

/// Index of the lowest defined energy, ignoring undefined entries.
pub fn lowest_energy_index(energies: &[Option<f64>]) -> Option<usize> {
    energies
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.filter(|v| v.is_finite()).map(|v| (i, v)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

/// Collects the per-point results of `store`.
///
/// Points reported as finished whose cube files no longer exist are
/// downgraded to failed with a missing-artifact message.
pub fn evaluate(store: &mut ScanResultStore) -> ScanEvaluation {
    let missing: Vec<(usize, PathBuf)> = store
        .points()
        .iter()
        .filter(|p| p.status == PointStatus::Done)
        .filter_map(|p| {
            [&p.esp_cube, &p.density_cube]
                .into_iter()
                .find_map(|path| match path {
                    Some(path) if path.is_file() => None,
                    Some(path) => Some(path.clone()),
                    None => Some(PathBuf::new()),
                })
                .map(|path| (p.index, path))
        })
        .collect();
    for (index, path) in missing {
        warn!(index, path = %path.display(), "Missing artifact for finished scan point.");
        store.invalidate(index, format!("missing artifact '{}'", path.display()));
    }

    let evaluation = collect(store);
    info!(
        done = store.count(PointStatus::Done),
        total = store.len(),
        lowest = ?evaluation.lowest_energy_index(),
        "Scan evaluated."
    );
    evaluation
}

/// Reads the per-point sequences from `store` without checking artifacts.
pub fn collect(store: &ScanResultStore) -> ScanEvaluation {
    let mut evaluation = ScanEvaluation::default();
    for point in store.points() {
        let done = point.status == PointStatus::Done;
        evaluation.energies.push(point.energy.filter(|_| done));
        evaluation
            .esp_cubes
            .push(point.esp_cube.clone().filter(|_| done));
        evaluation
            .density_cubes
            .push(point.density_cube.clone().filter(|_| done));
    }
    evaluation
}

/// Writes one CSV row per point: step, coordinate values, status, energy and
/// cube paths.
pub fn write_summary(
    store: &ScanResultStore,
    dofs: &[InternalCoordinate],
    path: &Path,
) -> Result<(), EngineError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["step".to_string()];
    header.extend(dofs.iter().map(|d| d.to_string()));
    header.extend(
        ["status", "energy", "esp_cube", "density_cube"]
            .iter()
            .map(|s| s.to_string()),
    );
    writer.write_record(&header)?;

    for point in store.points() {
        let mut record = vec![point.index.to_string()];
        record.extend(point.dof_values.iter().map(|v| v.to_string()));
        record.push(
            match point.status {
                PointStatus::Pending => "pending",
                PointStatus::Running => "running",
                PointStatus::Done => "done",
                PointStatus::Failed => "failed",
            }
            .to_string(),
        );
        record.push(point.energy.map(|e| format!("{:.10}", e)).unwrap_or_default());
        for cube in [&point.esp_cube, &point.density_cube] {
            record.push(
                cube.as_ref()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|e| EngineError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::Molecule;
    use crate::engine::store::{JobArtifacts, ScanPoint};
    use tempfile::tempdir;

    fn finished_store(dir: &Path, n: usize, failed: &[usize]) -> ScanResultStore {
        let mut store = ScanResultStore::new(
            (0..n)
                .map(|i| ScanPoint::new(i, vec![179.0 - 4.0 * i as f64], Molecule::default()))
                .collect(),
        );
        for i in 0..n {
            store.mark_running(i);
            if failed.contains(&i) {
                store.mark_failed(i, "crashed".into());
                continue;
            }
            let esp = dir.join(format!("gaussian_{}_scn_esp.cube", i));
            let dens = dir.join(format!("gaussian_{}_scn_dens.cube", i));
            std::fs::write(&esp, "").unwrap();
            std::fs::write(&dens, "").unwrap();
            store.mark_done(
                i,
                JobArtifacts {
                    energy: [-490.10, -490.30, -490.25, -490.20][i % 4],
                    esp_cube: esp,
                    density_cube: dens,
                },
            );
        }
        store
    }

    #[test]
    fn failed_point_yields_undefined_energy_and_is_skipped_for_minimum() {
        let dir = tempdir().unwrap();
        let mut store = finished_store(dir.path(), 4, &[1]);
        let evaluation = evaluate(&mut store);
        assert_eq!(
            evaluation.energies,
            vec![Some(-490.10), None, Some(-490.25), Some(-490.20)]
        );
        assert_eq!(evaluation.lowest_energy_index(), Some(2));
        assert!(evaluation.esp_cubes[1].is_none());
        assert_eq!(evaluation.cube_pairs().len(), 3);
    }

    #[test]
    fn lowest_energy_of_all_undefined_is_none() {
        assert_eq!(lowest_energy_index(&[None, None]), None);
        assert_eq!(lowest_energy_index(&[]), None);
        assert_eq!(lowest_energy_index(&[None, Some(1.0), Some(-2.0)]), Some(2));
    }

    #[test]
    fn missing_cube_downgrades_only_that_point() {
        let dir = tempdir().unwrap();
        let mut store = finished_store(dir.path(), 3, &[]);
        std::fs::remove_file(dir.path().join("gaussian_2_scn_esp.cube")).unwrap();
        let evaluation = evaluate(&mut store);
        assert_eq!(evaluation.energies[2], None);
        assert_eq!(store.get(2).unwrap().status, PointStatus::Failed);
        assert!(store
            .get(2)
            .unwrap()
            .message
            .as_deref()
            .unwrap()
            .contains("missing artifact"));
        assert_eq!(store.get(0).unwrap().status, PointStatus::Done);
    }

    #[test]
    fn summary_has_one_row_per_point() {
        let dir = tempdir().unwrap();
        let store = finished_store(dir.path(), 4, &[1]);
        let path = dir.path().join("summary.csv");
        write_summary(&store, &[InternalCoordinate::Angle(0, 1, 2)], &path).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[1], "angle(0-1-2)");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[1][2], "failed");
        assert_eq!(&rows[1][3], "");
        assert_eq!(&rows[0][3], "-490.1000000000");
    }
}
