//! All-or-nothing file writes.
//!
//! Plaintext is written to a hidden sibling of the destination and renamed
//! into place only after the last byte is flushed. A failure at any point
//! removes the temporary file, so a destination path either holds the complete
//! entry or is left untouched.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::Result;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Removes the temporary file on drop unless [`TempFileGuard::persist`] ran.
struct TempFileGuard {
    path: PathBuf,
    should_cleanup: bool,
}

impl TempFileGuard {
    const fn new(path: PathBuf) -> Self {
        Self {
            path,
            should_cleanup: true,
        }
    }

    fn persist(mut self) {
        self.should_cleanup = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.should_cleanup {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Temporary name next to `dest`, unique per process and call.
fn temp_path_for(dest: &Path) -> PathBuf {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = process::id();
    let original = dest
        .file_name()
        .map_or_else(|| "entry".to_string(), |n| n.to_string_lossy().into_owned());
    dest.with_file_name(format!(".{original}.arcsift-tmp-{pid}-{counter}"))
}

/// Writes `data` to `dest`, creating missing parent directories.
///
/// Returns the number of bytes written. An existing file at `dest` is
/// replaced.
///
/// # Errors
///
/// Returns `ArchiveError::Io` if a directory, the temporary file or the final
/// rename cannot be created. No partial file is left behind.
pub fn write_atomic(dest: &Path, data: &[u8]) -> Result<u64> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(dest);
    let guard = TempFileGuard::new(temp_path.clone());
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, dest)?;
    guard.persist();

    Ok(data.len() as u64)
}
