//! Output formatter trait for CLI results.

use anyhow::Result;
use arcsift_core::ArchiveFormat;
use arcsift_core::EntryDescriptor;
use arcsift_core::ExtractionResult;
use serde::Serialize;
use std::path::Path;

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format a detected archive format
    fn format_detection(&self, archive: &Path, format: ArchiveFormat) -> Result<()>;

    /// Format an entry listing, one name per line
    fn format_entries_short(&self, entries: &[EntryDescriptor]) -> Result<()>;

    /// Format an entry listing with sizes, method and encryption
    fn format_entries_long(&self, entries: &[EntryDescriptor], human_readable: bool) -> Result<()>;

    /// Format a single-entry extraction result
    fn format_extraction_result(&self, result: &ExtractionResult) -> Result<()>;
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Success,
            data: Some(data),
        }
    }
}
