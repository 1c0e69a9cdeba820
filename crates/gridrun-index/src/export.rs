use std::path::Path;

use csv::WriterBuilder;

use gridrun_core::errors::{ErrorInfo, GridError};
use gridrun_core::to_canonical_json_bytes;

use crate::index::ResultIndex;

/// Exports the index as a CSV table, one row per record.
pub fn export_csv(index: &ResultIndex, out: &Path) -> Result<(), GridError> {
    let mut writer = WriterBuilder::new()
        .from_path(out)
        .map_err(|err| wrap_csv("export.open", err))?;
    writer
        .write_record(["key", "phase", "path", "recorded_at", "params"])
        .map_err(|err| wrap_csv("export.header", err))?;
    for record in index.records() {
        writer
            .write_record([
                record.key.as_str(),
                record.phase.as_deref().unwrap_or(""),
                record.path.as_str(),
                record.recorded_at.as_str(),
                canonical_string(&record.params)?.as_str(),
            ])
            .map_err(|err| wrap_csv("export.row", err))?;
    }
    writer
        .flush()
        .map_err(|err| wrap_csv("export.flush", err.into()))?;
    Ok(())
}

fn canonical_string(params: &serde_json::Value) -> Result<String, GridError> {
    let bytes = to_canonical_json_bytes(params)?;
    String::from_utf8(bytes).map_err(|err| {
        GridError::Serde(
            ErrorInfo::new("export.canonical", "failed to encode canonical json")
                .with_hint(err.to_string()),
        )
    })
}

fn wrap_csv(code: &str, err: csv::Error) -> GridError {
    GridError::Serde(ErrorInfo::new(code, "CSV export failure").with_hint(err.to_string()))
}
