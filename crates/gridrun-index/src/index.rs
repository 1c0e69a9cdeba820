use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use gridrun_core::entry::canonical_key_of;
use gridrun_core::errors::{ErrorInfo, GridError};
use gridrun_core::provenance::{RunProvenance, SchemaVersion};
use gridrun_core::{from_json_slice, to_canonical_json_bytes};

/// Name of the serialized index artifact at the collection root.
pub const INDEX_FILE: &str = "index.json";

/// Schema version written by this release.
pub const SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(2, 0, 0);

/// Artifacts written before the schema carried a version field.
fn legacy_version() -> SchemaVersion {
    SchemaVersion::new(1, 0, 0)
}

/// Collision policy applied by [`ResultIndex::put`] and
/// [`ResultIndex::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Re-adding an identical parameter set fails with the duplicate family.
    #[default]
    Reject,
    /// Explicit opt-in replacement for intentional re-runs.
    Overwrite,
}

/// One indexed result: canonical key, parameters and directory location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: String,
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Directory path relative to the collection root.
    pub path: String,
    #[serde(default)]
    pub recorded_at: String,
}

impl IndexRecord {
    /// Creates a record stamped with the current wall-clock time.
    pub fn new(
        key: impl Into<String>,
        params: Value,
        phase: Option<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            params,
            phase,
            path: path.into(),
            recorded_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Metadata side table persisted with the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndexMeta {
    /// Free-text collection information.
    #[serde(default)]
    pub info: String,
    /// Parameter names that vary across the indexed entries.
    #[serde(default)]
    pub varying: Vec<String>,
    /// Provenance recorded at write time.
    #[serde(default)]
    pub provenance: RunProvenance,
}

/// Persistent map from canonical configuration keys to result directories.
///
/// The serialized form carries the schema version, the metadata side table
/// and the records in insertion order; the key map and the root directory
/// are rebuilt at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultIndex {
    #[serde(default = "legacy_version")]
    version: SchemaVersion,
    #[serde(default)]
    meta: IndexMeta,
    #[serde(default)]
    records: Vec<IndexRecord>,
    #[serde(skip)]
    by_key: BTreeMap<String, usize>,
    #[serde(skip)]
    root: PathBuf,
}

impl ResultIndex {
    /// Creates an empty index rooted at the given collection directory.
    pub fn create(root: impl Into<PathBuf>, meta: IndexMeta) -> Self {
        Self {
            version: SCHEMA_VERSION,
            meta,
            records: Vec::new(),
            by_key: BTreeMap::new(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut IndexMeta {
        &mut self.meta
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the records in insertion order.
    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Registers a result directory under its canonical key.
    ///
    /// Under [`DuplicatePolicy::Reject`] an existing key fails without
    /// mutating the mapping; under [`DuplicatePolicy::Overwrite`] the record
    /// is replaced in place, keeping its original position.
    pub fn put(&mut self, record: IndexRecord, policy: DuplicatePolicy) -> Result<(), GridError> {
        match self.by_key.get(&record.key) {
            Some(&slot) => match policy {
                DuplicatePolicy::Reject => Err(GridError::Duplicate(
                    ErrorInfo::new("index.duplicate_key", "configuration already indexed")
                        .with_context("key", record.key.clone())
                        .with_context("path", self.records[slot].path.clone())
                        .with_hint("enable overwrite mode to replace an existing result"),
                )),
                DuplicatePolicy::Overwrite => {
                    debug!(key = %record.key, "overwriting indexed result");
                    self.records[slot] = record;
                    Ok(())
                }
            },
            None => {
                self.by_key.insert(record.key.clone(), self.records.len());
                self.records.push(record);
                Ok(())
            }
        }
    }

    /// Resolves a canonical key to its absolute result directory.
    ///
    /// A key that was never indexed reports the not-found family; a key
    /// whose directory has since disappeared reports the stale family so
    /// callers can tell "never ran" from "ran then was deleted".
    pub fn get(&self, key: &str) -> Result<PathBuf, GridError> {
        let slot = self.by_key.get(key).ok_or_else(|| {
            GridError::NotFound(
                ErrorInfo::new("index.not_found", "no result recorded for key")
                    .with_context("key", key.to_string()),
            )
        })?;
        let path = self.root.join(&self.records[*slot].path);
        if !path.is_dir() {
            return Err(GridError::Stale(
                ErrorInfo::new("index.stale", "indexed directory is missing from storage")
                    .with_context("key", key.to_string())
                    .with_context("path", path.display().to_string()),
            ));
        }
        Ok(path)
    }

    /// Looks up a result by the parameter set that produced it.
    pub fn get_by_params(
        &self,
        params: &BTreeMap<String, Value>,
        phase: Option<&str>,
    ) -> Result<PathBuf, GridError> {
        let key = canonical_key_of(params, phase)?;
        self.get(&key)
    }

    /// Iterates `(parameters, absolute path)` pairs in insertion order.
    ///
    /// Each call starts a fresh pass over the records.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, PathBuf)> + '_ {
        self.records
            .iter()
            .map(|record| (&record.params, self.root.join(&record.path)))
    }

    /// Folds another index into this one under the given collision policy.
    pub fn merge(&mut self, other: &ResultIndex, policy: DuplicatePolicy) -> Result<(), GridError> {
        for record in &other.records {
            self.put(record.clone(), policy)?;
        }
        for axis in &other.meta.varying {
            if !self.meta.varying.contains(axis) {
                self.meta.varying.push(axis.clone());
            }
        }
        Ok(())
    }

    /// Serializes the index to `index.json` under the collection root.
    ///
    /// The artifact is written to a temporary file and renamed so concurrent
    /// readers always observe the last fully-written snapshot.
    pub fn persist(&self) -> Result<(), GridError> {
        fs::create_dir_all(&self.root)
            .map_err(|err| persist_error("index.create_root", &self.root, err))?;
        let bytes = to_canonical_json_bytes(self)?;
        let tmp = self.root.join(format!("{INDEX_FILE}.tmp"));
        let target = self.root.join(INDEX_FILE);
        fs::write(&tmp, &bytes).map_err(|err| persist_error("index.write", &tmp, err))?;
        fs::rename(&tmp, &target).map_err(|err| persist_error("index.rename", &target, err))?;
        debug!(records = self.records.len(), path = %target.display(), "index persisted");
        Ok(())
    }

    /// Loads the index artifact stored under the given collection root.
    ///
    /// Artifacts from older schema versions load with defaulted metadata;
    /// artifacts from a newer major version are refused.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, GridError> {
        let root = root.into();
        let path = root.join(INDEX_FILE);
        let bytes = fs::read(&path).map_err(|err| {
            GridError::Io(
                ErrorInfo::new("index.read", "failed to read index artifact")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        let mut index: ResultIndex = from_json_slice(&bytes)?;
        if index.version.major > SCHEMA_VERSION.major {
            return Err(GridError::Serde(
                ErrorInfo::new(
                    "index.schema_version",
                    format!(
                        "index written by schema {} but this build understands {}",
                        index.version, SCHEMA_VERSION
                    ),
                )
                .with_context("path", path.display().to_string()),
            ));
        }
        index.root = root;
        index.rebuild()?;
        Ok(index)
    }

    fn rebuild(&mut self) -> Result<(), GridError> {
        self.by_key.clear();
        for (slot, record) in self.records.iter().enumerate() {
            if self.by_key.insert(record.key.clone(), slot).is_some() {
                return Err(GridError::Serde(
                    ErrorInfo::new("index.corrupt", "duplicate key in serialized index")
                        .with_context("key", record.key.clone()),
                ));
            }
        }
        Ok(())
    }
}

fn persist_error(code: &str, path: &Path, err: std::io::Error) -> GridError {
    GridError::Persist(
        ErrorInfo::new(code, "failed to persist index artifact")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}
