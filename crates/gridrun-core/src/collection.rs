use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entry::ConfigEntry;
use crate::errors::GridError;
use crate::hash::stable_hash_string;
use crate::serde::to_canonical_json_bytes;

/// Ordered, append-only list of configuration entries.
///
/// The sequence index of an entry is stable and names its output
/// directory; entries are never removed or reordered once added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigCollection {
    entries: Vec<ConfigEntry>,
    metadata: String,
}

impl ConfigCollection {
    /// Creates an empty collection carrying free-text metadata.
    pub fn new(metadata: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            metadata: metadata.into(),
        }
    }

    /// Appends an entry, taking ownership so it cannot be mutated after add.
    pub fn append(&mut self, entry: ConfigEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries in insertion order.
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.iter()
    }

    /// Returns the free-text metadata of the collection.
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// Names of parameters whose value differs across entries.
    ///
    /// Derived on read rather than maintained on append; a parameter that
    /// is absent from some entries counts as varying.
    pub fn varying_axes(&self) -> Result<Vec<String>, GridError> {
        let mut names = BTreeSet::new();
        for entry in &self.entries {
            names.extend(entry.params().keys().cloned());
        }
        let mut varying = Vec::new();
        for name in names {
            let mut distinct: BTreeSet<Vec<u8>> = BTreeSet::new();
            let mut missing = false;
            for entry in &self.entries {
                match entry.param(&name) {
                    Some(value) => {
                        distinct.insert(to_canonical_json_bytes(value)?);
                    }
                    None => missing = true,
                }
            }
            if distinct.len() > 1 || (missing && !distinct.is_empty()) {
                varying.push(name.clone());
            }
        }
        Ok(varying)
    }

    /// Stable hash over the whole collection, used for provenance.
    pub fn collection_hash(&self) -> Result<String, GridError> {
        stable_hash_string(self)
    }
}
