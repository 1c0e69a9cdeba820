use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use gridrun_core::errors::GridError;

use crate::backend::{
    ExecutionBackend, OutcomeSender, RunOptions, UnitMember, UnitOutcome, WorkUnit,
};

/// File receiving the simulation's standard output inside each directory.
pub const STDOUT_LOG: &str = "stdout.log";
/// File receiving the simulation's standard error inside each directory.
pub const STDERR_LOG: &str = "stderr.log";

const WAIT_SLICE: Duration = Duration::from_millis(50);
const LOG_TAIL_CHARS: usize = 400;

/// Runs batches as isolated OS processes under a bounded worker pool.
///
/// The worker cap is a hard ceiling; excess batches queue until a worker
/// frees up. Each batch member is invoked as `command <dir>` in its own
/// process, so a crash in one batch cannot corrupt another's memory or
/// partially written files.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    command: PathBuf,
    post_command: Option<PathBuf>,
    max_workers: usize,
}

impl LocalBackend {
    pub fn new(command: impl Into<PathBuf>, max_workers: usize) -> Self {
        Self {
            command: command.into(),
            post_command: None,
            max_workers: max_workers.max(1),
        }
    }

    /// Adds a post-processing step run after each successful simulation,
    /// with the same single-argument invocation contract.
    pub fn with_post_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.post_command = Some(command.into());
        self
    }

    fn run_unit(&self, unit: &WorkUnit, options: &RunOptions) -> UnitOutcome {
        for member in &unit.members {
            if let Err(detail) = run_member(&self.command, member, options) {
                return UnitOutcome::failed(unit.seq, detail);
            }
            if let Some(post) = &self.post_command {
                if let Err(detail) = run_member(post, member, options) {
                    return UnitOutcome::failed(unit.seq, format!("post-process: {detail}"));
                }
            }
        }
        UnitOutcome::succeeded(unit.seq)
    }
}

impl ExecutionBackend for LocalBackend {
    fn execute(
        &self,
        units: Vec<WorkUnit>,
        options: &RunOptions,
        outcomes: &OutcomeSender,
    ) -> Result<(), GridError> {
        if units.is_empty() {
            return Ok(());
        }
        let workers = self.max_workers.min(units.len());
        let queue = Mutex::new(units.into_iter().collect::<VecDeque<WorkUnit>>());
        let queue = &queue;
        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = outcomes.clone();
                scope.spawn(move || loop {
                    if options.cancelled() {
                        break;
                    }
                    let unit = match queue.lock() {
                        Ok(mut pending) => pending.pop_front(),
                        Err(_) => None,
                    };
                    let Some(unit) = unit else {
                        break;
                    };
                    debug!(unit = unit.seq, members = unit.members.len(), "running local unit");
                    let outcome = self.run_unit(&unit, options);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                });
            }
        });
        Ok(())
    }
}

fn run_member(program: &Path, member: &UnitMember, options: &RunOptions) -> Result<(), String> {
    let stdout = File::create(member.dir.join(STDOUT_LOG))
        .map_err(|err| format!("failed to open {STDOUT_LOG}: {err}"))?;
    let stderr = File::create(member.dir.join(STDERR_LOG))
        .map_err(|err| format!("failed to open {STDERR_LOG}: {err}"))?;
    let mut child = Command::new(program)
        .arg(&member.dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|err| format!("failed to spawn {}: {err}", program.display()))?;
    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if let Some(limit) = options.timeout {
                    if started.elapsed() > limit {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(format!(
                            "entry {} timed out after {:.0?}",
                            member.seq, limit
                        ));
                    }
                }
                thread::sleep(WAIT_SLICE);
            }
            Err(err) => return Err(format!("failed to wait on {}: {err}", program.display())),
        }
    };
    if status.success() {
        Ok(())
    } else {
        Err(format!(
            "{} exited with {status}{}",
            program.display(),
            stderr_tail(&member.dir.join(STDERR_LOG))
        ))
    }
}

fn stderr_tail(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => {
            let trimmed = text.trim_end();
            let tail: String = trimmed
                .chars()
                .rev()
                .take(LOG_TAIL_CHARS)
                .collect::<String>()
                .chars()
                .rev()
                .collect();
            format!("; stderr tail: {tail}")
        }
        _ => String::new(),
    }
}
