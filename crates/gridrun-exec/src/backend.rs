use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gridrun_core::errors::GridError;

/// One entry's slot inside a dispatched batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMember {
    /// Sequence position of the entry in its collection.
    pub seq: usize,
    /// Working directory the simulation is invoked with.
    pub dir: PathBuf,
}

/// A batch of entries dispatched as a single unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub seq: usize,
    pub members: Vec<UnitMember>,
}

/// Lifecycle states of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Terminal outcome reported by a backend for one dispatched unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub seq: usize,
    pub status: UnitStatus,
    /// Captured diagnostic text for failed units.
    #[serde(default)]
    pub log: String,
}

impl UnitOutcome {
    pub fn succeeded(seq: usize) -> Self {
        Self {
            seq,
            status: UnitStatus::Succeeded,
            log: String::new(),
        }
    }

    pub fn failed(seq: usize, log: impl Into<String>) -> Self {
        Self {
            seq,
            status: UnitStatus::Failed,
            log: log.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UnitStatus::Succeeded
    }
}

/// Options applied to a single orchestration run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Per-batch deadline; one slow batch never blocks reporting the rest.
    pub timeout: Option<Duration>,
    /// Interval between scheduler status polls.
    pub poll_interval: Duration,
    /// Cooperative cancellation flag: stops new dispatch, in-flight units
    /// finish and still report their outcome.
    pub cancel: Arc<AtomicBool>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_secs(10),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl RunOptions {
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Returns a handle the caller can use to request cancellation.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }
}

/// Channel end backends report outcomes through, in completion order.
pub type OutcomeSender = Sender<UnitOutcome>;

/// Execution strategy turning batches into completed work.
///
/// Implementations send one [`UnitOutcome`] per dispatched unit as it
/// reaches a terminal state and return once every unit is accounted for.
/// Receiving zero units is a no-op.
pub trait ExecutionBackend: Send + Sync {
    fn execute(
        &self,
        units: Vec<WorkUnit>,
        options: &RunOptions,
        outcomes: &OutcomeSender,
    ) -> Result<(), GridError>;
}
