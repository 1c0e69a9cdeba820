use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use gridrun_exec::backend::{ExecutionBackend, RunOptions, UnitMember, UnitOutcome, WorkUnit};
use gridrun_exec::cluster::ClusterBackend;
use gridrun_exec::scheduler::mock::ScriptedScheduler;
use gridrun_exec::scheduler::{JobState, ResourceRequest};

fn make_units(root: &Path, count: usize, batch_size: usize) -> Vec<WorkUnit> {
    let mut units = Vec::new();
    let mut entry_seq = 0;
    for seq in 0..count {
        let members = (0..batch_size)
            .map(|_| {
                let member = UnitMember {
                    seq: entry_seq,
                    dir: root.join(format!("job_{entry_seq:06}_test")),
                };
                entry_seq += 1;
                member
            })
            .collect();
        units.push(WorkUnit { seq, members });
    }
    units
}

fn fast_options() -> RunOptions {
    RunOptions {
        poll_interval: Duration::from_millis(1),
        ..RunOptions::default()
    }
}

fn collect(backend: &ClusterBackend, units: Vec<WorkUnit>, options: &RunOptions) -> Vec<UnitOutcome> {
    let (tx, rx) = mpsc::channel();
    backend.execute(units, options, &tx).expect("execute");
    drop(tx);
    let mut outcomes: Vec<UnitOutcome> = rx.into_iter().collect();
    outcomes.sort_by_key(|outcome| outcome.seq);
    outcomes
}

#[test]
fn all_jobs_complete_with_requested_resources() {
    let scheduler = ScriptedScheduler::new();
    let resources = ResourceRequest {
        memory_mb: 2048,
        time_limit_min: 90,
        cpus: 2,
    };
    let backend = ClusterBackend::new(Box::new(scheduler), "run_sim").with_resources(resources);
    let outcomes = collect(&backend, make_units(Path::new("/data/scan"), 3, 1), &fast_options());
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(UnitOutcome::is_success));
}

#[test]
fn submissions_carry_resources_and_member_commands() {
    let scheduler = Arc::new(ScriptedScheduler::new());
    let backend = ClusterBackend::new(Box::new(Arc::clone(&scheduler)), "run_sim")
        .with_resources(ResourceRequest {
            memory_mb: 2048,
            time_limit_min: 90,
            cpus: 2,
        });
    let outcomes = collect(&backend, make_units(Path::new("/data/scan"), 1, 2), &fast_options());
    assert_eq!(outcomes.len(), 1);
    let submissions = scheduler.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].resources.memory_mb, 2048);
    assert_eq!(submissions[0].resources.cpus, 2);
    assert!(submissions[0].command.contains("job_000000_test"));
    assert!(submissions[0].command.contains("job_000001_test"));
    assert!(submissions[0].command.contains("&&"));
}

#[test]
fn one_failed_job_never_aborts_the_rest() {
    let scheduler = ScriptedScheduler::new()
        .with_sequence("unit_000001", vec![JobState::Running, JobState::Failed]);
    let backend = ClusterBackend::new(Box::new(scheduler), "run_sim");
    let outcomes = collect(&backend, make_units(Path::new("/data/scan"), 3, 1), &fast_options());
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success());
    assert!(!outcomes[1].is_success());
    assert!(outcomes[1].log.contains("FAILED"));
    assert!(outcomes[2].is_success());
}

#[test]
fn submit_failure_is_scoped_to_one_batch() {
    let scheduler = ScriptedScheduler::new().with_rejected("unit_000000");
    let backend = ClusterBackend::new(Box::new(scheduler), "run_sim");
    let outcomes = collect(&backend, make_units(Path::new("/data/scan"), 2, 1), &fast_options());
    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].is_success());
    assert!(outcomes[0].log.contains("submission failed"));
    assert!(outcomes[1].is_success());
}

#[test]
fn stuck_job_hits_the_batch_deadline() {
    let scheduler = ScriptedScheduler::new()
        .with_sequence("unit_000000", vec![JobState::Running]);
    let backend = ClusterBackend::new(Box::new(scheduler), "run_sim");
    let options = RunOptions {
        timeout: Some(Duration::from_millis(20)),
        poll_interval: Duration::from_millis(1),
        ..RunOptions::default()
    };
    let outcomes = collect(&backend, make_units(Path::new("/data/scan"), 1, 1), &options);
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].is_success());
    assert!(outcomes[0].log.contains("time limit"));
}

#[test]
fn zero_units_return_immediately() {
    let backend = ClusterBackend::new(Box::new(ScriptedScheduler::new()), "run_sim");
    let outcomes = collect(&backend, Vec::new(), &fast_options());
    assert!(outcomes.is_empty());
}
