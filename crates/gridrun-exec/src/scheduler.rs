use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};

use gridrun_core::errors::{ErrorInfo, GridError};

/// Resource requests attached to every submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub memory_mb: u64,
    pub time_limit_min: u64,
    pub cpus: u32,
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self {
            memory_mb: 1024,
            time_limit_min: 60,
            cpus: 1,
        }
    }
}

/// Description of one scheduler job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub name: String,
    pub workdir: PathBuf,
    /// Shell command executed on the allocated node.
    pub command: String,
    pub resources: ResourceRequest,
}

/// Scheduler-reported job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Parses the state token printed by a status program.
    pub fn parse(token: &str) -> Result<Self, GridError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(JobState::Pending),
            "RUNNING" => Ok(JobState::Running),
            "COMPLETED" => Ok(JobState::Completed),
            "FAILED" => Ok(JobState::Failed),
            other => Err(GridError::Execution(
                ErrorInfo::new("scheduler.state", "unrecognized job state token")
                    .with_context("token", other.to_string()),
            )),
        }
    }
}

/// Identifier assigned by the scheduler at submission time.
pub type JobId = String;

/// Contract the core requires from an external batch scheduler.
pub trait SchedulerClient: Send + Sync {
    fn submit(&self, request: &JobRequest) -> Result<JobId, GridError>;
    fn poll(&self, id: &JobId) -> Result<JobState, GridError>;
}

impl<T: SchedulerClient + ?Sized> SchedulerClient for std::sync::Arc<T> {
    fn submit(&self, request: &JobRequest) -> Result<JobId, GridError> {
        (**self).submit(request)
    }

    fn poll(&self, id: &JobId) -> Result<JobState, GridError> {
        (**self).poll(id)
    }
}

/// Adapter driving site-provided submit/status wrapper programs.
///
/// The submit program is invoked as
/// `submit <workdir> <command> <memory_mb> <minutes> <cpus>` and must print
/// the job id on the first line of stdout. The status program is invoked as
/// `status <job_id>` and must print one of `PENDING`, `RUNNING`,
/// `COMPLETED` or `FAILED`. Exact scheduler flags stay in the wrapper
/// scripts, outside this crate.
#[derive(Debug, Clone)]
pub struct ProcessScheduler {
    submit_program: PathBuf,
    status_program: PathBuf,
}

impl ProcessScheduler {
    pub fn new(submit_program: impl Into<PathBuf>, status_program: impl Into<PathBuf>) -> Self {
        Self {
            submit_program: submit_program.into(),
            status_program: status_program.into(),
        }
    }
}

impl SchedulerClient for ProcessScheduler {
    fn submit(&self, request: &JobRequest) -> Result<JobId, GridError> {
        let output = Command::new(&self.submit_program)
            .arg(&request.workdir)
            .arg(&request.command)
            .arg(request.resources.memory_mb.to_string())
            .arg(request.resources.time_limit_min.to_string())
            .arg(request.resources.cpus.to_string())
            .output()
            .map_err(|err| {
                GridError::Execution(
                    ErrorInfo::new("scheduler.submit_spawn", "failed to invoke submit program")
                        .with_context("program", self.submit_program.display().to_string())
                        .with_hint(err.to_string()),
                )
            })?;
        if !output.status.success() {
            return Err(GridError::Execution(
                ErrorInfo::new("scheduler.submit", "submit program reported failure")
                    .with_context("job", request.name.clone())
                    .with_hint(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = stdout.lines().next().unwrap_or("").trim().to_string();
        if id.is_empty() {
            return Err(GridError::Execution(
                ErrorInfo::new("scheduler.submit_id", "submit program returned no job id")
                    .with_context("job", request.name.clone()),
            ));
        }
        Ok(id)
    }

    fn poll(&self, id: &JobId) -> Result<JobState, GridError> {
        let output = Command::new(&self.status_program)
            .arg(id)
            .output()
            .map_err(|err| {
                GridError::Execution(
                    ErrorInfo::new("scheduler.status_spawn", "failed to invoke status program")
                        .with_context("program", self.status_program.display().to_string())
                        .with_hint(err.to_string()),
                )
            })?;
        if !output.status.success() {
            return Err(GridError::Execution(
                ErrorInfo::new("scheduler.status", "status program reported failure")
                    .with_context("job_id", id.clone())
                    .with_hint(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            ));
        }
        JobState::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

pub mod mock {
    //! Scripted scheduler for tests and dry runs.

    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    use super::{JobId, JobRequest, JobState, SchedulerClient};
    use gridrun_core::errors::{ErrorInfo, GridError};

    /// In-process scheduler walking each job through a scripted state
    /// sequence. Jobs without a script complete after one pending poll.
    pub struct ScriptedScheduler {
        scripts: Mutex<BTreeMap<String, Vec<JobState>>>,
        rejected: Vec<String>,
        jobs: Mutex<BTreeMap<JobId, VecDeque<JobState>>>,
        submitted: Mutex<Vec<JobRequest>>,
        counter: Mutex<u64>,
    }

    impl ScriptedScheduler {
        pub fn new() -> Self {
            Self {
                scripts: Mutex::new(BTreeMap::new()),
                rejected: Vec::new(),
                jobs: Mutex::new(BTreeMap::new()),
                submitted: Mutex::new(Vec::new()),
                counter: Mutex::new(0),
            }
        }

        /// Scripts the state sequence reported for the named job.
        pub fn with_sequence(self, name: impl Into<String>, states: Vec<JobState>) -> Self {
            self.scripts
                .lock()
                .expect("scripts mutex poisoned")
                .insert(name.into(), states);
            self
        }

        /// Makes submission of the named job fail.
        pub fn with_rejected(mut self, name: impl Into<String>) -> Self {
            self.rejected.push(name.into());
            self
        }

        /// Returns every request accepted so far.
        pub fn submissions(&self) -> Vec<JobRequest> {
            self.submitted
                .lock()
                .expect("submissions mutex poisoned")
                .clone()
        }
    }

    impl Default for ScriptedScheduler {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SchedulerClient for ScriptedScheduler {
        fn submit(&self, request: &JobRequest) -> Result<JobId, GridError> {
            if self.rejected.contains(&request.name) {
                return Err(GridError::Execution(
                    ErrorInfo::new("scheduler.submit", "submission rejected by script")
                        .with_context("job", request.name.clone()),
                ));
            }
            let mut counter = self.counter.lock().expect("counter mutex poisoned");
            *counter += 1;
            let id = format!("sched-{:04}", *counter);
            let states = self
                .scripts
                .lock()
                .expect("scripts mutex poisoned")
                .get(&request.name)
                .cloned()
                .unwrap_or_else(|| vec![JobState::Pending, JobState::Completed]);
            self.jobs
                .lock()
                .expect("jobs mutex poisoned")
                .insert(id.clone(), states.into());
            self.submitted
                .lock()
                .expect("submissions mutex poisoned")
                .push(request.clone());
            Ok(id)
        }

        fn poll(&self, id: &JobId) -> Result<JobState, GridError> {
            let mut jobs = self.jobs.lock().expect("jobs mutex poisoned");
            let queue = jobs.get_mut(id).ok_or_else(|| {
                GridError::Execution(
                    ErrorInfo::new("scheduler.status", "unknown job id")
                        .with_context("job_id", id.clone()),
                )
            })?;
            if queue.len() > 1 {
                Ok(queue.pop_front().unwrap_or(JobState::Completed))
            } else {
                Ok(*queue.front().unwrap_or(&JobState::Completed))
            }
        }
    }
}
