//! Persistent index mapping configurations to their result directories.

pub mod audit;
pub mod export;
pub mod index;
pub mod summary;

pub use audit::{audit, AuditReport};
pub use export::export_csv;
pub use index::{DuplicatePolicy, IndexMeta, IndexRecord, ResultIndex, INDEX_FILE};
pub use summary::{write_summary, SUMMARY_FILE};
