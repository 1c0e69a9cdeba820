use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ErrorInfo, GridError};
use crate::hash::stable_hash_string;
use crate::rng::fresh_seed;

/// Parameter-name validation variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaMode {
    /// Only the listed parameter names are accepted.
    Strict(BTreeSet<String>),
    /// Any parameter name is accepted.
    Permissive,
}

/// Validation schema applied when constructing a [`ConfigEntry`].
///
/// The schema also declares the seed fields of the experiment; declared
/// seeds are auto-filled with a fresh value per entry unless the caller
/// pins them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSchema {
    mode: SchemaMode,
    #[serde(default)]
    seeds: BTreeSet<String>,
}

impl ParamSchema {
    /// Creates a schema accepting any parameter name.
    pub fn permissive() -> Self {
        Self {
            mode: SchemaMode::Permissive,
            seeds: BTreeSet::new(),
        }
    }

    /// Creates a schema accepting only the listed parameter names.
    pub fn strict(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode: SchemaMode::Strict(allowed.into_iter().map(Into::into).collect()),
            seeds: BTreeSet::new(),
        }
    }

    /// Declares the seed fields filled automatically for each entry.
    pub fn with_seeds(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.seeds = names.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the declared seed field names.
    pub fn seed_names(&self) -> &BTreeSet<String> {
        &self.seeds
    }

    fn check_name(&self, name: &str) -> Result<(), GridError> {
        match &self.mode {
            SchemaMode::Permissive => Ok(()),
            SchemaMode::Strict(allowed) if allowed.contains(name) => Ok(()),
            SchemaMode::Strict(_) => Err(GridError::Parameter(
                ErrorInfo::new("entry.unknown_parameter", "parameter name not in schema")
                    .with_context("name", name.to_string())
                    .with_hint("use the permissive schema variant for free-form parameters"),
            )),
        }
    }
}

/// One validated point in the parameter grid.
///
/// Entries are immutable once appended to a collection; moving the entry
/// into the collection is what guarantees the key computed at add time
/// stays valid for the entry's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    params: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
    #[serde(default)]
    seeds: BTreeMap<String, u64>,
}

impl ConfigEntry {
    /// Validates the parameters against the schema and fills every declared
    /// seed with a fresh value.
    ///
    /// Two entries built with identical explicit parameters still differ in
    /// their seed fields unless the seeds are pinned afterwards.
    pub fn new(
        schema: &ParamSchema,
        params: BTreeMap<String, Value>,
        phase: Option<String>,
    ) -> Result<Self, GridError> {
        for (name, value) in &params {
            schema.check_name(name)?;
            ensure_scalar(name, value)?;
        }
        let seeds = schema
            .seed_names()
            .iter()
            .map(|name| (name.clone(), fresh_seed()))
            .collect();
        Ok(Self {
            params,
            phase,
            seeds,
        })
    }

    /// Pins a seed field to an explicit value.
    pub fn pin_seed(&mut self, name: impl Into<String>, value: u64) {
        self.seeds.insert(name.into(), value);
    }

    /// Returns the validated parameter mapping.
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// Returns one parameter value by name.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Returns the phase discriminator, if any.
    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }

    /// Returns the seed fields of this entry.
    pub fn seeds(&self) -> &BTreeMap<String, u64> {
        &self.seeds
    }

    /// Computes the canonical index key for this entry.
    ///
    /// Seed fields are excluded; a seed that is part of the experiment
    /// design belongs in the parameter mapping instead.
    pub fn canonical_key(&self) -> Result<String, GridError> {
        canonical_key_of(&self.params, self.phase.as_deref())
    }
}

/// Order-independent deterministic key over a parameter set and phase.
pub fn canonical_key_of(
    params: &BTreeMap<String, Value>,
    phase: Option<&str>,
) -> Result<String, GridError> {
    stable_hash_string(&(params, phase))
}

fn ensure_scalar(name: &str, value: &Value) -> Result<(), GridError> {
    match value {
        Value::Number(_) | Value::String(_) | Value::Bool(_) => Ok(()),
        _ => Err(GridError::Parameter(
            ErrorInfo::new("entry.non_scalar", "parameter values must be scalar")
                .with_context("name", name.to_string())
                .with_context("value", value.to_string()),
        )),
    }
}
