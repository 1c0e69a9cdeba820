use gridrun_core::entry::ConfigEntry;
use gridrun_core::errors::GridError;
use gridrun_core::to_canonical_json_bytes;

/// Produces the on-disk configuration text consumed by the simulation step.
///
/// The output is opaque bytes as far as the orchestration core is
/// concerned; domain-specific templating lives behind this seam.
pub trait ConfigRenderer: Send + Sync {
    /// File name written inside each unit directory.
    fn file_name(&self) -> &str;
    fn render(&self, entry: &ConfigEntry) -> Result<Vec<u8>, GridError>;
}

/// Default renderer emitting the entry parameters as canonical JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer;

impl ConfigRenderer for JsonRenderer {
    fn file_name(&self) -> &str {
        "params.json"
    }

    fn render(&self, entry: &ConfigEntry) -> Result<Vec<u8>, GridError> {
        to_canonical_json_bytes(entry.params())
    }
}
