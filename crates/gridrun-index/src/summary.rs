use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use gridrun_core::errors::{ErrorInfo, GridError};

use crate::index::ResultIndex;

/// Name of the human-readable summary beside the index artifact.
pub const SUMMARY_FILE: &str = "summary.txt";

/// Writes the collection summary: metadata, varying axes and their ranges.
pub fn write_summary(index: &ResultIndex) -> Result<PathBuf, GridError> {
    let mut out = String::new();
    out.push_str(&format!("gridrun index schema {}\n", index.version()));
    out.push_str("Metadata:\n");
    out.push_str(index.meta().info.as_str());
    out.push_str("\n\n");
    out.push_str(&format!("Indexed results: {}\n", index.len()));
    out.push_str("Varying axes:\n");
    for axis in &index.meta().varying {
        out.push_str(&describe_axis(index, axis));
        out.push('\n');
    }
    let path = index.root().join(SUMMARY_FILE);
    fs::write(&path, out).map_err(|err| {
        GridError::Io(
            ErrorInfo::new("summary.write", "failed to write collection summary")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    Ok(path)
}

fn describe_axis(index: &ResultIndex, axis: &str) -> String {
    let mut values: Vec<&Value> = Vec::new();
    for record in index.records() {
        if let Some(value) = record.params.get(axis) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    if values.iter().all(|value| value.is_number()) && !values.is_empty() {
        values.sort_by(|a, b| {
            let left = a.as_f64().unwrap_or(f64::NAN);
            let right = b.as_f64().unwrap_or(f64::NAN);
            left.partial_cmp(&right).unwrap_or(std::cmp::Ordering::Equal)
        });
        let lower = values[0];
        let upper = values[values.len() - 1];
        format!("{axis}: {} values in [{lower},{upper}]", values.len())
    } else {
        format!("{axis}: {} distinct values", values.len())
    }
}
