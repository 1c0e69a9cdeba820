#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gridrun_core::collection::ConfigCollection;
use gridrun_core::entry::{ConfigEntry, ParamSchema};
use gridrun_index::index::{DuplicatePolicy, IndexMeta, ResultIndex, INDEX_FILE};
use gridrun_index::summary::SUMMARY_FILE;
use gridrun_exec::local::LocalBackend;
use gridrun_exec::render::JsonRenderer;
use gridrun_orc::orchestrator::{Orchestrator, ENTRY_CONFIG_FILE};
use gridrun_orc::report::REPORT_FILE;
use serde_json::json;
use tempfile::tempdir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn x_sweep(values: &[i64]) -> ConfigCollection {
    let schema = ParamSchema::permissive();
    let mut collection = ConfigCollection::new("x sweep");
    for value in values {
        let mut params = BTreeMap::new();
        params.insert("x".to_string(), json!(value));
        collection.append(ConfigEntry::new(&schema, params, None).expect("entry"));
    }
    collection
}

fn params_for(x: i64) -> BTreeMap<String, serde_json::Value> {
    let mut params = BTreeMap::new();
    params.insert("x".to_string(), json!(x));
    params
}

#[test]
fn four_entries_two_workers_index_four_distinct_directories() {
    let scratch = tempdir().expect("tempdir");
    let root = scratch.path().join("scan");
    let script = write_script(scratch.path(), "sim.sh", r#"echo ok > "$1"/out.txt"#);
    let collection = x_sweep(&[1, 2, 3, 4]);
    let mut index = ResultIndex::create(&root, IndexMeta::default());
    let orchestrator = Orchestrator::new(&root, Box::new(LocalBackend::new(&script, 2)))
        .with_renderer(Box::new(JsonRenderer));
    let report = orchestrator.run(&collection, &mut index).expect("run");

    assert_eq!(report.indexed(), 4);
    assert_eq!(report.failed(), 0);
    assert_eq!(index.len(), 4);

    let mut seen = Vec::new();
    for x in [1, 2, 3, 4] {
        let dir = index.get_by_params(&params_for(x), None).expect("lookup");
        assert!(dir.is_dir());
        assert!(dir.join(ENTRY_CONFIG_FILE).exists());
        assert!(dir.join("params.json").exists());
        assert!(dir.join("out.txt").exists());
        assert!(!seen.contains(&dir));
        seen.push(dir);
    }
    assert!(root.join(INDEX_FILE).exists());
    assert!(root.join(SUMMARY_FILE).exists());
    assert!(root.join(REPORT_FILE).exists());
    assert_eq!(index.meta().varying, vec!["x".to_string()]);

    let reloaded = ResultIndex::load(&root).expect("reload");
    assert_eq!(reloaded.len(), 4);
}

#[test]
fn empty_collection_touches_nothing() {
    let scratch = tempdir().expect("tempdir");
    let root = scratch.path().join("scan");
    let script = write_script(scratch.path(), "sim.sh", "exit 0");
    let collection = ConfigCollection::new("empty");
    let mut index = ResultIndex::create(&root, IndexMeta::default());
    let orchestrator = Orchestrator::new(&root, Box::new(LocalBackend::new(&script, 1)));
    let report = orchestrator.run(&collection, &mut index).expect("run");
    assert!(report.entries.is_empty());
    assert!(index.is_empty());
    assert!(!root.exists());
}

#[test]
fn single_entry_single_worker_completes() {
    let scratch = tempdir().expect("tempdir");
    let root = scratch.path().join("scan");
    let script = write_script(scratch.path(), "sim.sh", r#"echo ok > "$1"/out.txt"#);
    let collection = x_sweep(&[7]);
    let mut index = ResultIndex::create(&root, IndexMeta::default());
    let orchestrator = Orchestrator::new(&root, Box::new(LocalBackend::new(&script, 1)));
    let report = orchestrator.run(&collection, &mut index).expect("run");
    assert_eq!(report.indexed(), 1);
    assert_eq!(index.len(), 1);
    index.get_by_params(&params_for(7), None).expect("lookup");
}

#[test]
fn failed_entry_is_reported_and_successes_survive() {
    let scratch = tempdir().expect("tempdir");
    let root = scratch.path().join("scan");
    let script = write_script(
        scratch.path(),
        "sim.sh",
        r#"if grep -q '"x":2' "$1"/config.json; then echo bad point >&2; exit 1; fi
echo ok > "$1"/out.txt"#,
    );
    let collection = x_sweep(&[1, 2, 3]);
    let mut index = ResultIndex::create(&root, IndexMeta::default());
    let orchestrator = Orchestrator::new(&root, Box::new(LocalBackend::new(&script, 2)));
    let report = orchestrator.run(&collection, &mut index).expect("run");

    assert_eq!(report.indexed(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(index.len(), 2);
    let failed = report
        .entries
        .iter()
        .find(|entry| entry.seq == 1)
        .expect("entry 1");
    assert!(failed.detail.contains("bad point"));

    index.get_by_params(&params_for(1), None).expect("success stays");
    index.get_by_params(&params_for(3), None).expect("success stays");
    assert!(index.get_by_params(&params_for(2), None).is_err());

    let reloaded = ResultIndex::load(&root).expect("reload");
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn rerunning_identical_configurations_skips_duplicates() {
    let scratch = tempdir().expect("tempdir");
    let root = scratch.path().join("scan");
    let script = write_script(scratch.path(), "sim.sh", r#"echo ok > "$1"/out.txt"#);
    let mut index = ResultIndex::create(&root, IndexMeta::default());
    let orchestrator = Orchestrator::new(&root, Box::new(LocalBackend::new(&script, 2)));

    let first = orchestrator.run(&x_sweep(&[1, 2]), &mut index).expect("run");
    assert_eq!(first.indexed(), 2);

    let second = orchestrator.run(&x_sweep(&[1, 2]), &mut index).expect("rerun");
    assert_eq!(second.indexed(), 0);
    assert_eq!(second.skipped(), 2);
    assert_eq!(index.len(), 2);
}

#[test]
fn overwrite_mode_replaces_previous_results() {
    let scratch = tempdir().expect("tempdir");
    let root = scratch.path().join("scan");
    let script = write_script(scratch.path(), "sim.sh", r#"echo ok > "$1"/out.txt"#);
    let mut index = ResultIndex::create(&root, IndexMeta::default());

    let first_run = Orchestrator::new(&root, Box::new(LocalBackend::new(&script, 2)));
    first_run.run(&x_sweep(&[1, 2]), &mut index).expect("run");

    let rerun = Orchestrator::new(&root, Box::new(LocalBackend::new(&script, 2)))
        .with_policy(DuplicatePolicy::Overwrite);
    let report = rerun.run(&x_sweep(&[1, 2]), &mut index).expect("rerun");
    assert_eq!(report.indexed(), 2);
    assert_eq!(report.skipped(), 0);
    assert_eq!(index.len(), 2);
}
