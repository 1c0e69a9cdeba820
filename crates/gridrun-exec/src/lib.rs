//! Execution backends turning configuration batches into completed work.

pub mod backend;
pub mod cluster;
pub mod local;
pub mod render;
pub mod scheduler;

pub use backend::{
    ExecutionBackend, OutcomeSender, RunOptions, UnitMember, UnitOutcome, UnitStatus, WorkUnit,
};
pub use cluster::ClusterBackend;
pub use local::LocalBackend;
pub use render::{ConfigRenderer, JsonRenderer};
pub use scheduler::{
    JobId, JobRequest, JobState, ProcessScheduler, ResourceRequest, SchedulerClient,
};
