#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use gridrun_exec::backend::{ExecutionBackend, RunOptions, UnitMember, UnitOutcome, WorkUnit};
use gridrun_exec::local::LocalBackend;
use tempfile::tempdir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn make_units(root: &Path, count: usize) -> Vec<WorkUnit> {
    (0..count)
        .map(|seq| {
            let dir = root.join(format!("job_{seq:06}_test"));
            fs::create_dir_all(&dir).expect("unit dir");
            WorkUnit {
                seq,
                members: vec![UnitMember { seq, dir }],
            }
        })
        .collect()
}

fn collect(backend: &LocalBackend, units: Vec<WorkUnit>, options: &RunOptions) -> Vec<UnitOutcome> {
    let (tx, rx) = mpsc::channel();
    backend.execute(units, options, &tx).expect("execute");
    drop(tx);
    rx.into_iter().collect()
}

#[test]
fn bounded_pool_completes_all_units() {
    let root = tempdir().expect("tempdir");
    let script = write_script(root.path(), "sim.sh", r#"echo done > "$1"/done.txt"#);
    let units = make_units(root.path(), 4);
    let backend = LocalBackend::new(&script, 2);
    let outcomes = collect(&backend, units, &RunOptions::default());
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(UnitOutcome::is_success));
    for seq in 0..4 {
        assert!(root
            .path()
            .join(format!("job_{seq:06}_test"))
            .join("done.txt")
            .exists());
    }
}

#[test]
fn failing_unit_is_reported_without_aborting_siblings() {
    let root = tempdir().expect("tempdir");
    let script = write_script(
        root.path(),
        "sim.sh",
        r#"if [ -e "$1"/poison ]; then echo boom >&2; exit 3; fi
echo done > "$1"/done.txt"#,
    );
    let units = make_units(root.path(), 3);
    fs::write(root.path().join("job_000001_test").join("poison"), b"").expect("poison");
    let backend = LocalBackend::new(&script, 2);
    let mut outcomes = collect(&backend, units, &RunOptions::default());
    outcomes.sort_by_key(|outcome| outcome.seq);
    assert!(outcomes[0].is_success());
    assert!(!outcomes[1].is_success());
    assert!(outcomes[1].log.contains("exited with"));
    assert!(outcomes[1].log.contains("boom"));
    assert!(outcomes[2].is_success());
}

#[test]
fn zero_units_produce_no_outcomes() {
    let root = tempdir().expect("tempdir");
    let script = write_script(root.path(), "sim.sh", "exit 0");
    let backend = LocalBackend::new(&script, 2);
    let outcomes = collect(&backend, Vec::new(), &RunOptions::default());
    assert!(outcomes.is_empty());
}

#[test]
fn single_unit_with_one_worker_completes() {
    let root = tempdir().expect("tempdir");
    let script = write_script(root.path(), "sim.sh", r#"echo done > "$1"/done.txt"#);
    let units = make_units(root.path(), 1);
    let backend = LocalBackend::new(&script, 1);
    let outcomes = collect(&backend, units, &RunOptions::default());
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_success());
}

#[test]
fn post_command_runs_after_the_simulation_step() {
    let root = tempdir().expect("tempdir");
    let script = write_script(root.path(), "sim.sh", r#"echo sim > "$1"/step.txt"#);
    let post = write_script(root.path(), "post.sh", r#"echo post >> "$1"/step.txt"#);
    let units = make_units(root.path(), 1);
    let backend = LocalBackend::new(&script, 1).with_post_command(&post);
    let outcomes = collect(&backend, units, &RunOptions::default());
    assert!(outcomes[0].is_success());
    let steps = fs::read_to_string(root.path().join("job_000000_test").join("step.txt"))
        .expect("steps");
    assert_eq!(steps, "sim\npost\n");
}

#[test]
fn slow_unit_is_killed_at_the_batch_deadline() {
    let root = tempdir().expect("tempdir");
    let script = write_script(root.path(), "sim.sh", "sleep 30");
    let units = make_units(root.path(), 1);
    let backend = LocalBackend::new(&script, 1);
    let options = RunOptions {
        timeout: Some(Duration::from_millis(200)),
        ..RunOptions::default()
    };
    let outcomes = collect(&backend, units, &options);
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].is_success());
    assert!(outcomes[0].log.contains("timed out"));
}
