use serde::{Deserialize, Serialize};

/// Name of the run report written at the collection root.
pub const REPORT_FILE: &str = "run_report.json";

/// Final disposition of one collection entry after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryDisposition {
    /// The entry executed and its directory is registered in the index.
    Indexed,
    /// The entry's batch failed; diagnostic text is in `detail`.
    Failed,
    /// The entry's key was already indexed and overwrite mode was off.
    SkippedDuplicate,
}

/// Per-entry line of the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryReport {
    pub seq: usize,
    pub key: String,
    pub path: String,
    pub disposition: EntryDisposition,
    #[serde(default)]
    pub detail: String,
}

/// Outcome of one orchestration run: exactly one disposition per entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub collection_hash: String,
    pub entries: Vec<EntryReport>,
}

impl RunReport {
    pub fn indexed(&self) -> usize {
        self.count(EntryDisposition::Indexed)
    }

    pub fn failed(&self) -> usize {
        self.count(EntryDisposition::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(EntryDisposition::SkippedDuplicate)
    }

    fn count(&self, disposition: EntryDisposition) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.disposition == disposition)
            .count()
    }
}
