//! Outcome of a single-entry extraction.

use std::path::Path;
use std::path::PathBuf;

/// Where one entry was written and how many bytes landed there.
///
/// Directory entries report zero bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Path the entry was written to.
    pub destination: PathBuf,

    /// Number of plaintext bytes written.
    pub bytes_written: u64,
}

impl ExtractionResult {
    /// Creates a result for `destination`.
    #[must_use]
    pub fn new(destination: impl Into<PathBuf>, bytes_written: u64) -> Self {
        Self {
            destination: destination.into(),
            bytes_written,
        }
    }

    /// Returns the destination path.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}
