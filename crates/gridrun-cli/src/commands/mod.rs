pub mod doctor;
pub mod export;
pub mod get;
pub mod list;
pub mod merge;
pub mod run;

use std::collections::BTreeMap;
use std::error::Error;

use serde_json::Value;

/// Parses repeated `--param name=value` arguments; values that are not
/// valid JSON scalars are kept as strings.
pub fn parse_params(raw: &[String]) -> Result<BTreeMap<String, Value>, Box<dyn Error>> {
    let mut params = BTreeMap::new();
    for item in raw {
        let (name, raw_value) = item
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=VALUE, got '{item}'"))?;
        let value = serde_json::from_str::<Value>(raw_value)
            .unwrap_or_else(|_| Value::String(raw_value.to_string()));
        params.insert(name.to_string(), value);
    }
    Ok(params)
}
