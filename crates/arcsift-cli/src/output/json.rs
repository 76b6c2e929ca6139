//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use anyhow::Result;
use arcsift_core::ArchiveFormat;
use arcsift_core::EntryDescriptor;
use arcsift_core::EntryKind;
use arcsift_core::ExtractionResult;
use serde::Serialize;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonFormatter;

#[derive(Serialize)]
struct EntryOutput<'a> {
    index: usize,
    name: &'a str,
    kind: &'static str,
    size: u64,
    compressed_size: u64,
    method: String,
    encrypted: bool,
    encryption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    crc32: Option<u32>,
}

impl<'a> From<&'a EntryDescriptor> for EntryOutput<'a> {
    fn from(entry: &'a EntryDescriptor) -> Self {
        Self {
            index: entry.index(),
            name: entry.name(),
            kind: match entry.kind() {
                EntryKind::File => "file",
                EntryKind::Directory => "directory",
                EntryKind::Symlink => "symlink",
                EntryKind::Hardlink => "hardlink",
            },
            size: entry.uncompressed_size(),
            compressed_size: entry.compressed_size(),
            method: entry.method().to_string(),
            encrypted: entry.is_encrypted(),
            encryption: entry.encryption().to_string(),
            crc32: entry.crc32(),
        }
    }
}

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }

    fn listing(entries: &[EntryDescriptor]) -> Result<()> {
        #[derive(Serialize)]
        struct ListOutput<'a> {
            total_entries: usize,
            entries: Vec<EntryOutput<'a>>,
        }

        let data = ListOutput {
            total_entries: entries.len(),
            entries: entries.iter().map(EntryOutput::from).collect(),
        };
        Self::output(&JsonOutput::success("list", data))
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_detection(&self, archive: &Path, format: ArchiveFormat) -> Result<()> {
        #[derive(Serialize)]
        struct DetectOutput {
            archive: String,
            format: &'static str,
        }

        let data = DetectOutput {
            archive: archive.display().to_string(),
            format: format.name(),
        };
        Self::output(&JsonOutput::success("detect", data))
    }

    fn format_entries_short(&self, entries: &[EntryDescriptor]) -> Result<()> {
        Self::listing(entries)
    }

    fn format_entries_long(&self, entries: &[EntryDescriptor], _human_readable: bool) -> Result<()> {
        Self::listing(entries)
    }

    fn format_extraction_result(&self, result: &ExtractionResult) -> Result<()> {
        #[derive(Serialize)]
        struct ExtractionOutput {
            destination: String,
            bytes_written: u64,
        }

        let data = ExtractionOutput {
            destination: result.destination().display().to_string(),
            bytes_written: result.bytes_written,
        };
        Self::output(&JsonOutput::success("extract", data))
    }
}
