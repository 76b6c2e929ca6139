//! Path-based calls for front ends.
//!
//! [`Unarchiver`] wraps [`ArchiveSession`] behind four calls that take an
//! archive path each time: detect, list, set a password, extract one entry.
//! Passwords are remembered per archive path on the `Unarchiver` value
//! itself; there is no process-wide store.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use log::debug;

use crate::ArchiveSession;
use crate::Result;
use crate::SecurityConfig;
use crate::formats::ArchiveFormat;
use crate::formats::detect_path;
use crate::types::EntryDescriptor;
use crate::types::Password;
use crate::types::SafePath;

/// Detects the format of the archive at `path` using the default settings.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read and `UnsupportedFormat` if no
/// signature matches.
///
/// # Examples
///
/// ```no_run
/// use arcsift_core::detect_format;
///
/// # fn main() -> Result<(), arcsift_core::ArchiveError> {
/// let format = detect_format("backup.tar.zst")?;
/// println!("{}", format.name());
/// # Ok(())
/// # }
/// ```
pub fn detect_format(path: impl AsRef<Path>) -> Result<ArchiveFormat> {
    detect_path(path.as_ref(), &SecurityConfig::default())
}

/// Stateless-per-call archive access with remembered passwords.
///
/// # Examples
///
/// ```no_run
/// use arcsift_core::Unarchiver;
///
/// # fn main() -> Result<(), arcsift_core::ArchiveError> {
/// let mut unarchiver = Unarchiver::new();
/// let entries = unarchiver.list_contents("docs.7z")?;
/// println!("{} entries", entries.len());
///
/// unarchiver.set_password("docs.7z", "open sesame");
/// let written = unarchiver.extract_file("docs.7z", 0, "/tmp/docs")?;
/// println!("wrote {}", written.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Unarchiver {
    config: SecurityConfig,
    passwords: HashMap<PathBuf, Password>,
}

impl Unarchiver {
    /// Creates an `Unarchiver` with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an `Unarchiver` with custom limits.
    #[must_use]
    pub fn with_config(config: SecurityConfig) -> Self {
        Self {
            config,
            passwords: HashMap::new(),
        }
    }

    /// Detects the format of the archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `UnsupportedFormat`.
    pub fn detect_format(&self, path: impl AsRef<Path>) -> Result<ArchiveFormat> {
        detect_path(path.as_ref(), &self.config)
    }

    /// Lists the entries of the archive at `path`.
    ///
    /// The directory is parsed afresh on every call. A password stored for
    /// `path` is handed to the parser, which only formats with encrypted
    /// directories consult.
    ///
    /// # Errors
    ///
    /// Any error [`ArchiveSession::open`] returns.
    pub fn list_contents(&self, path: impl AsRef<Path>) -> Result<Vec<EntryDescriptor>> {
        let session = self.open(path.as_ref())?;
        Ok(session.list_entries()?.to_vec())
    }

    /// Remembers `password` for the archive at `path`.
    pub fn set_password(&mut self, path: impl AsRef<Path>, password: impl Into<Password>) {
        self.passwords.insert(password_key(path.as_ref()), password.into());
    }

    /// Forgets the password stored for `path`.
    pub fn clear_password(&mut self, path: impl AsRef<Path>) {
        self.passwords.remove(&password_key(path.as_ref()));
    }

    /// Extracts entry `index` of the archive at `path` below `dest_dir`.
    ///
    /// The entry name is sanitized and joined onto `dest_dir`, which is
    /// created if missing. Returns the path that was written.
    ///
    /// # Errors
    ///
    /// - `IndexOutOfRange` if `index` is not below the entry count
    /// - `PathTraversal` or `UnsafeEntryName` if the entry name would escape
    ///   `dest_dir`
    /// - `PasswordRequired` or `IncorrectPassword` for encrypted entries
    /// - any error from opening, decoding or writing
    pub fn extract_file(
        &self,
        path: impl AsRef<Path>,
        index: usize,
        dest_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let dest_dir = dest_dir.as_ref();
        let mut session = self.open(path.as_ref())?;

        let safe = SafePath::from_entry_name(session.entry(index)?.name())?;
        std::fs::create_dir_all(dest_dir)?;
        let target = safe.resolve_under(dest_dir)?;

        let result = session.extract_entry(index, &target)?;
        Ok(result.destination)
    }

    fn open(&self, path: &Path) -> Result<ArchiveSession> {
        let mut session = ArchiveSession::with_config(self.config.clone());
        if let Some(password) = self.passwords.get(&password_key(path)) {
            debug!("using stored password for {}", path.display());
            session.set_password(password.clone());
        }
        session.open(path)?;
        Ok(session)
    }
}

/// The same archive reached through different spellings shares a password.
fn password_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
