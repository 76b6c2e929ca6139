//! Archive introspection and single-entry extraction.
//!
//! `arcsift-core` identifies ZIP, 7z, RAR and tar archives (plain or wrapped
//! in gzip, bzip2, xz or zstd) by their magic bytes, lists their directories
//! without decoding any entry data, and extracts individual entries on
//! demand, decrypting ZipCrypto, WinZip AES and 7z AES content when a
//! password is supplied.
//!
//! Every length and offset read from an archive is validated against the
//! source before use, so damaged or hostile input ends in an error rather
//! than a panic or an out-of-bounds read.
//!
//! # Examples
//!
//! ```no_run
//! use arcsift_core::ArchiveError;
//! use arcsift_core::ArchiveSession;
//!
//! # fn main() -> Result<(), ArchiveError> {
//! let mut session = ArchiveSession::new();
//! session.open("release.tar.xz")?;
//! println!("format: {}", session.format()?);
//!
//! match session.extract_entry(0, "/tmp/first") {
//!     Err(e) if e.is_password_required() => {
//!         session.set_password("from the user");
//!         session.extract_entry(0, "/tmp/first")?;
//!     }
//!     other => {
//!         other?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod io;
pub(crate) mod pipeline;
pub mod report;
pub mod security;
pub mod session;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::Unarchiver;
pub use api::detect_format;
pub use config::SecurityConfig;
pub use error::ArchiveError;
pub use error::QuotaResource;
pub use error::Result;
pub use formats::ArchiveFormat;
pub use report::ExtractionResult;
pub use session::ArchiveSession;
pub use types::CompressionMethod;
pub use types::Encryption;
pub use types::EntryDescriptor;
pub use types::EntryKind;
pub use types::Password;
pub use types::SafePath;
