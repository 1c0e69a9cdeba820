use std::mem;
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use gridrun_core::errors::GridError;

use crate::backend::{ExecutionBackend, OutcomeSender, RunOptions, UnitOutcome, WorkUnit};
use crate::scheduler::{JobId, JobRequest, JobState, ResourceRequest, SchedulerClient};

/// Submits batches to an external scheduler and waits for terminal states.
///
/// Jobs are independent: a subset failing never aborts the rest, and the
/// backend surfaces success or failure per batch rather than per
/// submission round. Cluster-side concurrency is owned by the scheduler.
pub struct ClusterBackend {
    scheduler: Box<dyn SchedulerClient>,
    command: String,
    resources: ResourceRequest,
}

struct SubmittedJob {
    unit_seq: usize,
    id: JobId,
    submitted: Instant,
}

impl ClusterBackend {
    pub fn new(scheduler: Box<dyn SchedulerClient>, command: impl Into<String>) -> Self {
        Self {
            scheduler,
            command: command.into(),
            resources: ResourceRequest::default(),
        }
    }

    pub fn with_resources(mut self, resources: ResourceRequest) -> Self {
        self.resources = resources;
        self
    }

    /// One shell command covering every member of the batch.
    fn job_command(&self, unit: &WorkUnit) -> String {
        unit.members
            .iter()
            .map(|member| format!("{} {}", self.command, shell_quote(&member.dir.display().to_string())))
            .collect::<Vec<_>>()
            .join(" && ")
    }

    fn job_request(&self, unit: &WorkUnit) -> JobRequest {
        let workdir = unit
            .members
            .first()
            .and_then(|member| member.dir.parent())
            .map(|parent| parent.to_path_buf())
            .unwrap_or_default();
        JobRequest {
            name: format!("unit_{:06}", unit.seq),
            workdir,
            command: self.job_command(unit),
            resources: self.resources,
        }
    }
}

impl ExecutionBackend for ClusterBackend {
    fn execute(
        &self,
        units: Vec<WorkUnit>,
        options: &RunOptions,
        outcomes: &OutcomeSender,
    ) -> Result<(), GridError> {
        if units.is_empty() {
            return Ok(());
        }
        let mut pending: Vec<SubmittedJob> = Vec::new();
        for unit in &units {
            if options.cancelled() {
                break;
            }
            let request = self.job_request(unit);
            match self.scheduler.submit(&request) {
                Ok(id) => {
                    debug!(unit = unit.seq, job_id = %id, "submitted cluster job");
                    pending.push(SubmittedJob {
                        unit_seq: unit.seq,
                        id,
                        submitted: Instant::now(),
                    });
                }
                Err(err) => {
                    warn!(unit = unit.seq, "cluster submission failed");
                    let _ = outcomes.send(UnitOutcome::failed(
                        unit.seq,
                        format!("submission failed: {err}"),
                    ));
                }
            }
        }
        while !pending.is_empty() {
            let mut still_pending = Vec::with_capacity(pending.len());
            for job in mem::take(&mut pending) {
                match self.scheduler.poll(&job.id) {
                    Ok(state) if state.is_terminal() => {
                        let outcome = if state == JobState::Completed {
                            UnitOutcome::succeeded(job.unit_seq)
                        } else {
                            UnitOutcome::failed(
                                job.unit_seq,
                                format!("scheduler reported FAILED for job {}", job.id),
                            )
                        };
                        let _ = outcomes.send(outcome);
                    }
                    Ok(_) => {
                        if let Some(limit) = options.timeout {
                            if job.submitted.elapsed() > limit {
                                let _ = outcomes.send(UnitOutcome::failed(
                                    job.unit_seq,
                                    format!("job {} exceeded the batch time limit {:.0?}", job.id, limit),
                                ));
                                continue;
                            }
                        }
                        still_pending.push(job);
                    }
                    Err(err) => {
                        let _ = outcomes.send(UnitOutcome::failed(
                            job.unit_seq,
                            format!("status poll failed: {err}"),
                        ));
                    }
                }
            }
            pending = still_pending;
            if !pending.is_empty() {
                thread::sleep(options.poll_interval);
            }
        }
        Ok(())
    }
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}
