//! Core parameter records and canonical identity for gridrun.

pub mod collection;
pub mod entry;
pub mod errors;
pub mod hash;
pub mod plan;
pub mod provenance;
pub mod rng;
mod serde;

pub use collection::ConfigCollection;
pub use entry::{canonical_key_of, ConfigEntry, ParamSchema, SchemaMode};
pub use errors::{ErrorInfo, GridError};
pub use hash::stable_hash_string;
pub use plan::{
    expand_plan, GridParameter, LhsParameter, SchemaSpec, SweepPlan, SweepStrategy,
};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_seed, fresh_seed};

pub use crate::serde::{from_json_slice, to_canonical_json_bytes};
