use std::collections::BTreeMap;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::collection::ConfigCollection;
use crate::entry::{ConfigEntry, ParamSchema};
use crate::errors::GridError;

/// Schema declaration carried inside a sweep plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SchemaSpec {
    /// Allowed parameter names; absent means the permissive variant.
    #[serde(default)]
    pub allowed: Option<Vec<String>>,
    /// Seed field names auto-filled per entry.
    #[serde(default)]
    pub seeds: Vec<String>,
}

impl SchemaSpec {
    /// Builds the validation schema this spec describes.
    pub fn to_schema(&self) -> ParamSchema {
        let schema = match &self.allowed {
            Some(allowed) => ParamSchema::strict(allowed.iter().cloned()),
            None => ParamSchema::permissive(),
        };
        schema.with_seeds(self.seeds.iter().cloned())
    }
}

/// Plan describing the sweep strategy and parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    pub name: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub schema: SchemaSpec,
    pub strategy: SweepStrategy,
    /// Parameters held constant across every entry.
    #[serde(default)]
    pub fixed: BTreeMap<String, Value>,
    /// Seed fields pinned to explicit values on every entry.
    #[serde(default)]
    pub seeds: BTreeMap<String, u64>,
}

/// Supported deterministic sweep strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SweepStrategy {
    Grid {
        parameters: Vec<GridParameter>,
    },
    Lhs {
        parameters: Vec<LhsParameter>,
        samples: usize,
    },
}

/// Grid parameter descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParameter {
    pub name: String,
    pub values: Vec<Value>,
}

/// Latin hypercube parameter descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LhsParameter {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

/// Expands a sweep plan into a configuration collection.
///
/// Grid strategies enumerate the cross product in declaration order; LHS
/// strategies sample deterministically from the master seed.
pub fn expand_plan(plan: &SweepPlan, seed: u64) -> Result<ConfigCollection, GridError> {
    let schema = plan.schema.to_schema();
    let points = expand_points(&plan.strategy, seed)?;
    let metadata = if plan.metadata.is_empty() {
        plan.name.clone()
    } else {
        format!("{}: {}", plan.name, plan.metadata)
    };
    let mut collection = ConfigCollection::new(metadata);
    for mut params in points {
        for (name, value) in &plan.fixed {
            params.insert(name.clone(), value.clone());
        }
        let mut entry = ConfigEntry::new(&schema, params, plan.phase.clone())?;
        for (name, value) in &plan.seeds {
            entry.pin_seed(name.clone(), *value);
        }
        collection.append(entry);
    }
    Ok(collection)
}

fn expand_points(
    strategy: &SweepStrategy,
    seed: u64,
) -> Result<Vec<BTreeMap<String, Value>>, GridError> {
    match strategy {
        SweepStrategy::Grid { parameters } => {
            let mut outputs = Vec::new();
            expand_grid(parameters, 0, BTreeMap::new(), &mut outputs);
            Ok(outputs)
        }
        SweepStrategy::Lhs {
            parameters,
            samples,
        } => Ok(expand_lhs(parameters, *samples, seed)),
    }
}

fn expand_grid(
    params: &[GridParameter],
    idx: usize,
    current: BTreeMap<String, Value>,
    outputs: &mut Vec<BTreeMap<String, Value>>,
) {
    if idx == params.len() {
        outputs.push(current);
        return;
    }
    let param = &params[idx];
    for value in &param.values {
        let mut next = current.clone();
        next.insert(param.name.clone(), value.clone());
        expand_grid(params, idx + 1, next, outputs);
    }
}

fn expand_lhs(params: &[LhsParameter], samples: usize, seed: u64) -> Vec<BTreeMap<String, Value>> {
    let mut outputs = vec![BTreeMap::new(); samples];
    let mut rng = StdRng::seed_from_u64(seed);
    let base_slots: Vec<f64> = (0..samples)
        .map(|i| (i as f64 + 0.5) / samples as f64)
        .collect();
    for param in params {
        let mut slots = base_slots.clone();
        slots.shuffle(&mut rng);
        for (idx, frac) in slots.iter().enumerate() {
            let value = param.min + frac * (param.max - param.min);
            outputs[idx].insert(param.name.clone(), json!(value));
        }
    }
    outputs
}
