use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use gridrun_core::errors::{ErrorInfo, GridError};

use crate::index::ResultIndex;

/// Outcome of checking the index against the directories on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Number of records inspected.
    pub checked: usize,
    /// Record paths whose directory no longer exists (stale entries).
    pub missing: Vec<String>,
    /// `job_*` directories under the root not covered by any record.
    pub orphans: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.orphans.is_empty()
    }
}

/// Verifies that every record resolves to an existing directory and lists
/// result directories the index does not know about.
pub fn audit(index: &ResultIndex) -> Result<AuditReport, GridError> {
    let mut missing = Vec::new();
    let referenced: BTreeSet<&str> = index
        .records()
        .iter()
        .map(|record| record.path.as_str())
        .collect();
    for record in index.records() {
        if !index.root().join(&record.path).is_dir() {
            warn!(key = %record.key, path = %record.path, "indexed directory is missing");
            missing.push(record.path.clone());
        }
    }
    let mut orphans = Vec::new();
    if index.root().is_dir() {
        for entry in WalkDir::new(index.root()).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| {
                GridError::Io(
                    ErrorInfo::new("audit.walk", "failed to scan collection root")
                        .with_hint(err.to_string()),
                )
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("job_") && !referenced.contains(name.as_str()) {
                orphans.push(name);
            }
        }
    }
    orphans.sort();
    Ok(AuditReport {
        checked: index.len(),
        missing,
        orphans,
    })
}
