//! The archive session: one opened archive, its directory and a password.
//!
//! A session moves through three states. It starts unopened, becomes opened
//! once the sniffer and the directory parser have both succeeded, and ends
//! closed when the caller releases it. A closed session may be opened again.

use std::path::Path;
use std::path::PathBuf;

use log::debug;
use log::info;

use crate::ArchiveError;
use crate::Result;
use crate::SecurityConfig;
use crate::extraction::reader::read_raw;
use crate::extraction::write_atomic;
use crate::formats::ArchiveFormat;
use crate::formats::ParseContext;
use crate::formats::detect::detect_source;
use crate::formats::parser_for;
use crate::pipeline;
use crate::report::ExtractionResult;
use crate::source::ByteSource;
use crate::types::EntryDescriptor;
use crate::types::EntryKind;
use crate::types::Password;

#[derive(Debug)]
enum State {
    Unopened,
    Opened(OpenArchive),
    Closed,
}

#[derive(Debug)]
struct OpenArchive {
    path: PathBuf,
    format: ArchiveFormat,
    source: ByteSource,
    entries: Vec<EntryDescriptor>,
}

/// A stateful handle over a single archive.
///
/// At most one operation runs at a time: every method that touches the
/// archive takes `&mut self` or `&self`, and the session owns its source
/// handle exclusively. Independent sessions share nothing.
///
/// # Examples
///
/// ```no_run
/// use arcsift_core::ArchiveSession;
///
/// # fn main() -> Result<(), arcsift_core::ArchiveError> {
/// let mut session = ArchiveSession::new();
/// session.open("photos.zip")?;
/// for entry in session.list_entries()? {
///     println!("{:>4} {}", entry.index(), entry.name());
/// }
/// session.set_password("hunter2");
/// let result = session.extract_entry(0, "/tmp/first.jpg")?;
/// println!("{} bytes", result.bytes_written);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ArchiveSession {
    config: SecurityConfig,
    password: Option<Password>,
    state: State,
}

impl Default for ArchiveSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveSession {
    /// Creates an unopened session with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SecurityConfig::default())
    }

    /// Creates an unopened session with custom limits.
    #[must_use]
    pub const fn with_config(config: SecurityConfig) -> Self {
        Self {
            config,
            password: None,
            state: State::Unopened,
        }
    }

    /// Returns the limits this session enforces.
    #[must_use]
    pub const fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Opens `path`, detects its format and parses the directory.
    ///
    /// Opening an already opened or closed session replaces whatever it held.
    /// On failure the session is left unopened.
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be read
    /// - `UnsupportedFormat` if no signature matches
    /// - `CorruptArchive`, `TruncatedArchive`, `UnsupportedFeature` or
    ///   `QuotaExceeded` if the directory cannot be parsed
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.state = State::Unopened;

        let mut source = ByteSource::open(path)?;
        let file_name = path.file_name().and_then(|n| n.to_str());
        let format = detect_source(&mut source, file_name, &self.config)?;

        let parser = parser_for(format);
        let mut source = parser.prepare(source, &self.config)?;
        let ctx = ParseContext {
            config: &self.config,
            password: self.password.as_ref(),
        };
        let entries = parser.parse(&mut source, &ctx)?;

        info!(
            "opened {} ({}, {} entries)",
            path.display(),
            format.name(),
            entries.len()
        );
        self.state = State::Opened(OpenArchive {
            path: path.to_path_buf(),
            format,
            source,
            entries,
        });
        Ok(())
    }

    /// Returns `true` between a successful [`open`](Self::open) and
    /// [`close`](Self::close).
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, State::Opened(_))
    }

    /// Path of the opened archive.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.state {
            State::Opened(open) => Some(&open.path),
            State::Unopened | State::Closed => None,
        }
    }

    /// Detected format of the opened archive.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotOpen` outside the opened state.
    pub fn format(&self) -> Result<ArchiveFormat> {
        Ok(self.opened()?.format)
    }

    /// Returns the directory in on-disk order.
    ///
    /// The slice is the same on every call.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotOpen` outside the opened state.
    pub fn list_entries(&self) -> Result<&[EntryDescriptor]> {
        Ok(&self.opened()?.entries)
    }

    /// Returns the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotOpen` outside the opened state and
    /// `IndexOutOfRange` if `index` is not below the entry count.
    pub fn entry(&self, index: usize) -> Result<&EntryDescriptor> {
        let entries = &self.opened()?.entries;
        entries.get(index).ok_or(ArchiveError::IndexOutOfRange {
            index,
            len: entries.len(),
        })
    }

    /// Stores the password used by later extractions.
    ///
    /// The password is not checked here; a wrong one surfaces when an
    /// encrypted entry is decoded.
    pub fn set_password(&mut self, password: impl Into<Password>) {
        self.password = Some(password.into());
    }

    /// Forgets the stored password.
    pub fn clear_password(&mut self) {
        self.password = None;
    }

    /// Returns `true` if a password is stored.
    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Decodes the entry at `index` into memory.
    ///
    /// Directories decode to an empty buffer.
    ///
    /// # Errors
    ///
    /// - `SessionNotOpen`, `IndexOutOfRange`
    /// - `PasswordRequired` if the entry is encrypted and no password is set
    /// - `IncorrectPassword` if the password fails verification
    /// - `UnsupportedFeature` for symbolic links and out-of-reach data
    /// - any decoding error from the pipeline
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        let Self {
            config,
            password,
            state,
        } = self;
        let State::Opened(open) = state else {
            return Err(ArchiveError::SessionNotOpen);
        };
        let OpenArchive {
            format,
            source,
            entries,
            ..
        } = open;

        let entry = entries.get(index).ok_or(ArchiveError::IndexOutOfRange {
            index,
            len: entries.len(),
        })?;

        match entry.kind() {
            EntryKind::Directory => Ok(Vec::new()),
            EntryKind::Symlink => Err(ArchiveError::UnsupportedFeature(format!(
                "{}: symbolic links are not extracted",
                entry.name()
            ))),
            EntryKind::Hardlink => Err(ArchiveError::UnsupportedFeature(format!(
                "{}: hard links are not extracted",
                entry.name()
            ))),
            EntryKind::File => {
                debug!("reading entry {index} ({})", entry.name());
                let raw = read_raw(source, entry)?;
                pipeline::decode(raw, *format, entry, password.as_ref(), config)
            }
        }
    }

    /// Extracts the entry at `index` to the file `destination`.
    ///
    /// The plaintext is fully decoded and verified before anything is written,
    /// and the write itself goes through a temporary sibling, so a failed
    /// extraction never leaves a partial file at `destination`. Directory
    /// entries create `destination` as a directory.
    ///
    /// # Errors
    ///
    /// Everything [`read_entry`](Self::read_entry) returns, plus `Io` if the
    /// destination cannot be written.
    pub fn extract_entry(
        &mut self,
        index: usize,
        destination: impl AsRef<Path>,
    ) -> Result<ExtractionResult> {
        let destination = destination.as_ref();

        if self.entry(index)?.is_directory() {
            std::fs::create_dir_all(destination)?;
            return Ok(ExtractionResult::new(destination, 0));
        }

        let data = self.read_entry(index)?;
        let bytes_written = write_atomic(destination, &data)?;
        debug!(
            "extracted entry {index} to {} ({bytes_written} bytes)",
            destination.display()
        );
        Ok(ExtractionResult::new(destination, bytes_written))
    }

    /// Releases the source handle.
    ///
    /// The stored password survives so that a re-opened archive can use it.
    pub fn close(&mut self) {
        if let State::Opened(open) = &self.state {
            debug!("closing {}", open.path.display());
        }
        self.state = State::Closed;
    }

    fn opened(&self) -> Result<&OpenArchive> {
        match &self.state {
            State::Opened(open) => Ok(open),
            State::Unopened | State::Closed => Err(ArchiveError::SessionNotOpen),
        }
    }
}
