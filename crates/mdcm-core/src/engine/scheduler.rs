use super::backend::{JobStatus, QmBackend};
use super::config::ScanConfig;
use super::error::EngineError;
use super::job::JobDescriptor;
use super::progress::{Progress, ProgressReporter};
use super::store::ScanResultStore;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Bounded pool of QM jobs driven by a single polling loop.
///
/// At most `parallel_tasks` jobs are outstanding at any time. Each loop
/// iteration fills free slots with the next pending points in scan order,
/// polls every outstanding handle once and sleeps for the polling interval.
/// A failing job only ever fails its own point.
pub struct TaskScheduler<'b, B: QmBackend> {
    backend: &'b mut B,
    parallel_tasks: usize,
    polling_interval: Duration,
}

impl<'b, B: QmBackend> TaskScheduler<'b, B> {
    pub fn new(backend: &'b mut B, parallel_tasks: usize, polling_interval: Duration) -> Self {
        Self {
            backend,
            parallel_tasks: parallel_tasks.max(1),
            polling_interval,
        }
    }

    pub fn from_config(backend: &'b mut B, config: &ScanConfig) -> Self {
        Self::new(
            backend,
            config.parallel_tasks,
            Duration::from_secs(config.polling_interval),
        )
    }

    /// Runs the given jobs to completion, recording every outcome in `store`.
    ///
    /// The store is persisted to `state_path` each time a point resolves. Only
    /// a failure to persist aborts the run.
    pub fn run(
        &mut self,
        jobs: Vec<JobDescriptor>,
        store: &mut ScanResultStore,
        state_path: &Path,
        reporter: &ProgressReporter,
    ) -> Result<ExecutionSummary, EngineError> {
        let mut summary = ExecutionSummary::default();
        let mut queue: VecDeque<JobDescriptor> = jobs.into();
        let mut active: Vec<(JobDescriptor, B::Handle)> = Vec::with_capacity(self.parallel_tasks);

        reporter.report(Progress::TaskStart {
            total_steps: queue.len() as u64,
        });

        while !queue.is_empty() || !active.is_empty() {
            let mut resolved = false;

            while active.len() < self.parallel_tasks {
                let Some(job) = queue.pop_front() else {
                    break;
                };
                if !store.mark_running(job.index) {
                    debug!(index = job.index, "Point is not pending; skipping.");
                    continue;
                }
                summary.submitted += 1;
                match self.backend.submit(&job) {
                    Ok(handle) => {
                        debug!(index = job.index, job = %job.stem, "Job submitted.");
                        active.push((job, handle));
                    }
                    Err(e) => {
                        self.resolve_failure(store, job.index, e.to_string(), reporter);
                        summary.failed += 1;
                        resolved = true;
                    }
                }
            }

            let mut still_running = Vec::with_capacity(active.len());
            for (job, mut handle) in active.drain(..) {
                match self.backend.poll(&mut handle) {
                    JobStatus::Running => still_running.push((job, handle)),
                    JobStatus::Finished => {
                        resolved = true;
                        match self.backend.fetch_artifacts(&job, &handle) {
                            Ok(artifacts) => {
                                info!(
                                    index = job.index,
                                    energy = artifacts.energy,
                                    "Scan point finished."
                                );
                                store.mark_done(job.index, artifacts);
                                summary.succeeded += 1;
                                reporter.report(Progress::PointResolved {
                                    index: job.index,
                                    success: true,
                                });
                                reporter.report(Progress::TaskIncrement);
                            }
                            Err(e) => {
                                self.resolve_failure(store, job.index, e.to_string(), reporter);
                                summary.failed += 1;
                            }
                        }
                    }
                    JobStatus::Failed(message) => {
                        resolved = true;
                        self.resolve_failure(store, job.index, message, reporter);
                        summary.failed += 1;
                    }
                }
            }
            active = still_running;

            if resolved {
                store.save(state_path)?;
            }
            if !active.is_empty() {
                std::thread::sleep(self.polling_interval);
            }
        }

        reporter.report(Progress::TaskFinish);
        info!(
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "All submitted jobs resolved."
        );
        Ok(summary)
    }

    fn resolve_failure(
        &self,
        store: &mut ScanResultStore,
        index: usize,
        message: String,
        reporter: &ProgressReporter,
    ) {
        warn!(index, "Scan point failed: {}", message);
        store.mark_failed(index, message);
        reporter.report(Progress::PointResolved {
            index,
            success: false,
        });
        reporter.report(Progress::TaskIncrement);
    }
}
