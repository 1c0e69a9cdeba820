use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;

use serde_json::Value;
use tracing::{debug, info, warn};

use gridrun_core::collection::ConfigCollection;
use gridrun_core::errors::{ErrorInfo, GridError};
use gridrun_core::provenance::RunProvenance;
use gridrun_core::to_canonical_json_bytes;
use gridrun_exec::backend::{ExecutionBackend, RunOptions, UnitMember, UnitOutcome, WorkUnit};
use gridrun_exec::render::ConfigRenderer;
use gridrun_index::index::{DuplicatePolicy, IndexRecord, ResultIndex};
use gridrun_index::summary::write_summary;

use crate::report::{EntryDisposition, EntryReport, RunReport, REPORT_FILE};

/// Serialized configuration written into every entry directory.
pub const ENTRY_CONFIG_FILE: &str = "config.json";

struct PlannedEntry {
    seq: usize,
    key: String,
    dir_name: String,
    params: Value,
    phase: Option<String>,
}

/// Composes a backend with the result index for one collection run.
///
/// Per submission the orchestrator prepares entry directories, dispatches
/// batches, commits outcomes in whatever order they complete and persists
/// the index after every committed batch. The index is an explicitly passed
/// handle; cross-run collisions are governed by the duplicate policy, not a
/// file lock.
pub struct Orchestrator {
    root: PathBuf,
    backend: Box<dyn ExecutionBackend>,
    renderer: Option<Box<dyn ConfigRenderer>>,
    batch_size: usize,
    policy: DuplicatePolicy,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(root: impl Into<PathBuf>, backend: Box<dyn ExecutionBackend>) -> Self {
        Self {
            root: root.into(),
            backend,
            renderer: None,
            batch_size: 1,
            policy: DuplicatePolicy::Reject,
            options: RunOptions::default(),
        }
    }

    /// Attaches a domain config renderer invoked per entry before dispatch.
    pub fn with_renderer(mut self, renderer: Box<dyn ConfigRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Number of entries grouped into one dispatched batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Executes the collection and folds the outcomes into the index.
    ///
    /// Batch failures are downgraded to per-entry report lines; a failure
    /// to persist the index is fatal and surfaces as the persist family
    /// after in-flight batches wind down.
    pub fn run(
        &self,
        collection: &ConfigCollection,
        index: &mut ResultIndex,
    ) -> Result<RunReport, GridError> {
        let collection_hash = collection.collection_hash()?;
        if collection.is_empty() {
            info!("empty collection, nothing to dispatch");
            return Ok(RunReport {
                collection_hash,
                entries: Vec::new(),
            });
        }

        debug!(entries = collection.len(), "preparing entry directories");
        let planned = self.prepare(collection)?;
        self.update_meta(collection, &collection_hash, index)?;
        let units = self.form_units(&planned);
        let mut members_of: BTreeMap<usize, Vec<usize>> = units
            .iter()
            .map(|unit| {
                (
                    unit.seq,
                    unit.members.iter().map(|member| member.seq).collect(),
                )
            })
            .collect();
        info!(
            entries = planned.len(),
            units = units.len(),
            batch_size = self.batch_size,
            "dispatching collection"
        );

        let mut dispositions: BTreeMap<usize, EntryReport> = BTreeMap::new();
        let mut fatal: Option<GridError> = None;
        let (tx, rx) = mpsc::channel::<UnitOutcome>();
        let backend = self.backend.as_ref();
        let options = &self.options;
        thread::scope(|scope| {
            let handle = scope.spawn(move || backend.execute(units, options, &tx));
            for outcome in rx {
                debug!(unit = outcome.seq, success = outcome.is_success(), "committing outcome");
                let member_seqs = members_of.remove(&outcome.seq).unwrap_or_default();
                if let Err(err) =
                    self.commit(&outcome, &member_seqs, &planned, index, &mut dispositions)
                {
                    warn!(unit = outcome.seq, "index persistence failed, cancelling dispatch");
                    options.cancel.store(true, Ordering::SeqCst);
                    fatal = Some(err);
                    break;
                }
            }
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                }
                Err(_) => {
                    if fatal.is_none() {
                        fatal = Some(GridError::Execution(ErrorInfo::new(
                            "orchestrator.backend_panic",
                            "execution backend panicked",
                        )));
                    }
                }
            }
        });
        if let Some(err) = fatal {
            return Err(err);
        }

        let entries: Vec<EntryReport> = planned
            .iter()
            .map(|plan| {
                dispositions.remove(&plan.seq).unwrap_or_else(|| EntryReport {
                    seq: plan.seq,
                    key: plan.key.clone(),
                    path: plan.dir_name.clone(),
                    disposition: EntryDisposition::Failed,
                    detail: "no outcome reported; dispatch was cancelled".to_string(),
                })
            })
            .collect();
        let report = RunReport {
            collection_hash,
            entries,
        };
        index.persist()?;
        write_summary(index)?;
        self.write_report(&report)?;
        info!(
            indexed = report.indexed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "run complete"
        );
        Ok(report)
    }

    fn prepare(&self, collection: &ConfigCollection) -> Result<Vec<PlannedEntry>, GridError> {
        fs::create_dir_all(&self.root).map_err(|err| {
            GridError::Io(
                ErrorInfo::new("orchestrator.create_root", "failed to create collection root")
                    .with_context("path", self.root.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        let mut planned = Vec::with_capacity(collection.len());
        for (seq, entry) in collection.iter().enumerate() {
            let key = entry.canonical_key()?;
            let dir_name = format!("job_{seq:06}_{}", &key[..8]);
            let dir = self.root.join(&dir_name);
            fs::create_dir_all(&dir).map_err(|err| {
                GridError::Io(
                    ErrorInfo::new("orchestrator.create_dir", "failed to create entry directory")
                        .with_context("path", dir.display().to_string())
                        .with_hint(err.to_string()),
                )
            })?;
            let config = to_canonical_json_bytes(entry)?;
            write_entry_file(&dir.join(ENTRY_CONFIG_FILE), &config)?;
            if let Some(renderer) = &self.renderer {
                let rendered = renderer.render(entry)?;
                write_entry_file(&dir.join(renderer.file_name()), &rendered)?;
            }
            let params = serde_json::to_value(entry.params()).map_err(|err| {
                GridError::Serde(ErrorInfo::new("orchestrator.params", err.to_string()))
            })?;
            planned.push(PlannedEntry {
                seq,
                key,
                dir_name,
                params,
                phase: entry.phase().map(str::to_string),
            });
        }
        Ok(planned)
    }

    fn form_units(&self, planned: &[PlannedEntry]) -> Vec<WorkUnit> {
        planned
            .chunks(self.batch_size)
            .enumerate()
            .map(|(seq, chunk)| WorkUnit {
                seq,
                members: chunk
                    .iter()
                    .map(|plan| UnitMember {
                        seq: plan.seq,
                        dir: self.root.join(&plan.dir_name),
                    })
                    .collect(),
            })
            .collect()
    }

    fn update_meta(
        &self,
        collection: &ConfigCollection,
        collection_hash: &str,
        index: &mut ResultIndex,
    ) -> Result<(), GridError> {
        let axes = collection.varying_axes()?;
        let meta = index.meta_mut();
        if meta.info.is_empty() {
            meta.info = collection.metadata().to_string();
        }
        for axis in axes {
            if !meta.varying.contains(&axis) {
                meta.varying.push(axis);
            }
        }
        meta.provenance = RunProvenance::capture(collection_hash);
        Ok(())
    }

    fn commit(
        &self,
        outcome: &UnitOutcome,
        member_seqs: &[usize],
        planned: &[PlannedEntry],
        index: &mut ResultIndex,
        dispositions: &mut BTreeMap<usize, EntryReport>,
    ) -> Result<(), GridError> {
        if outcome.is_success() {
            for &seq in member_seqs {
                let plan = &planned[seq];
                let record = IndexRecord::new(
                    plan.key.clone(),
                    plan.params.clone(),
                    plan.phase.clone(),
                    plan.dir_name.clone(),
                );
                let report = match index.put(record, self.policy) {
                    Ok(()) => EntryReport {
                        seq,
                        key: plan.key.clone(),
                        path: plan.dir_name.clone(),
                        disposition: EntryDisposition::Indexed,
                        detail: String::new(),
                    },
                    Err(GridError::Duplicate(info)) => EntryReport {
                        seq,
                        key: plan.key.clone(),
                        path: plan.dir_name.clone(),
                        disposition: EntryDisposition::SkippedDuplicate,
                        detail: info.message,
                    },
                    Err(other) => return Err(other),
                };
                dispositions.insert(seq, report);
            }
            index.persist()?;
        } else {
            for &seq in member_seqs {
                let plan = &planned[seq];
                dispositions.insert(
                    seq,
                    EntryReport {
                        seq,
                        key: plan.key.clone(),
                        path: plan.dir_name.clone(),
                        disposition: EntryDisposition::Failed,
                        detail: outcome.log.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    fn write_report(&self, report: &RunReport) -> Result<(), GridError> {
        let bytes = to_canonical_json_bytes(report)?;
        let path = self.root.join(REPORT_FILE);
        fs::write(&path, bytes).map_err(|err| {
            GridError::Io(
                ErrorInfo::new("orchestrator.report", "failed to write run report")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })
    }
}

fn write_entry_file(path: &Path, bytes: &[u8]) -> Result<(), GridError> {
    fs::write(path, bytes).map_err(|err| {
        GridError::Io(
            ErrorInfo::new("orchestrator.write_config", "failed to write entry configuration")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })
}
