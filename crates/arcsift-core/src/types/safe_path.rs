//! Sanitized relative path derived from an archive entry name.

use crate::ArchiveError;
use crate::Result;
use std::path::Path;
use std::path::PathBuf;

/// A relative path that is safe to join onto a destination directory.
///
/// Entry names come from untrusted headers. A `SafePath` can only be built
/// through [`SafePath::from_entry_name`], which rejects:
/// - parent components (`..`)
/// - absolute names (`/etc/passwd`, `\\server\share`)
/// - drive prefixes (`C:`)
/// - NUL bytes and names with no usable component
///
/// Both `/` and `\` are accepted as separators, since archivers on Windows
/// store either.
///
/// # Examples
///
/// ```
/// use arcsift_core::types::SafePath;
/// use std::path::Path;
///
/// let safe = SafePath::from_entry_name("docs/./guide.md")?;
/// assert_eq!(safe.as_path(), Path::new("docs/guide.md"));
///
/// assert!(SafePath::from_entry_name("../etc/passwd").is_err());
/// # Ok::<(), arcsift_core::ArchiveError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafePath(PathBuf);

impl SafePath {
    /// Validates an entry name and normalizes it into a relative path.
    ///
    /// # Errors
    ///
    /// - `ArchiveError::PathTraversal` for `..`, absolute names and drive
    ///   prefixes
    /// - `ArchiveError::UnsafeEntryName` for NUL bytes or empty names
    pub fn from_entry_name(name: &str) -> Result<Self> {
        if name.contains('\0') {
            return Err(ArchiveError::UnsafeEntryName { name: name.into() });
        }

        if name.starts_with('/') || name.starts_with('\\') {
            return Err(ArchiveError::PathTraversal { path: name.into() });
        }

        let mut normalized = PathBuf::new();
        for (position, component) in name.split(['/', '\\']).enumerate() {
            match component {
                "" | "." => {}
                ".." => {
                    return Err(ArchiveError::PathTraversal { path: name.into() });
                }
                c if position == 0 && is_drive_prefix(c) => {
                    return Err(ArchiveError::PathTraversal { path: name.into() });
                }
                c => normalized.push(c),
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(ArchiveError::UnsafeEntryName { name: name.into() });
        }

        Ok(Self(normalized))
    }

    /// Joins this path onto `dest`, refusing results that leave `dest`.
    ///
    /// The existing part of the joined path is canonicalized so that a
    /// symlink planted inside `dest` cannot redirect the write.
    pub fn resolve_under(&self, dest: &Path) -> Result<PathBuf> {
        let root = dest.canonicalize()?;
        let joined = root.join(self.as_path());

        let mut ancestor = joined.as_path();
        loop {
            match ancestor.canonicalize() {
                Ok(canonical) => {
                    if !canonical.starts_with(&root) {
                        return Err(ArchiveError::PathTraversal {
                            path: self.0.clone(),
                        });
                    }
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    match ancestor.parent() {
                        Some(parent) => ancestor = parent,
                        None => break,
                    }
                }
                Err(e) => return Err(ArchiveError::Io(e)),
            }
        }

        Ok(joined)
    }

    /// Returns the path as a `&Path`.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

fn is_drive_prefix(component: &str) -> bool {
    let bytes = component.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
