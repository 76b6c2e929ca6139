//! Value types shared by the parsers, the decode pipeline and the session.
//!
//! Entry descriptors are produced once per directory parse and never mutated.
//! Passwords and sanitized paths are newtypes so that they cannot be confused
//! with arbitrary strings.

pub mod entry;
pub mod password;
pub mod safe_path;

pub use entry::AesStrength;
pub use entry::CompressionMethod;
pub use entry::Encryption;
pub use entry::EntryDescriptor;
pub use entry::EntryKind;
pub use entry::EntryLocation;
pub use password::Password;
pub use safe_path::SafePath;
