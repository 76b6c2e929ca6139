//! Format detection and one directory parser per archive family.

pub mod compression;
pub mod detect;
pub mod rar;
pub mod sevenz;
pub mod tar;
pub mod traits;
pub mod zip;

pub use detect::ArchiveFormat;
pub use detect::detect_path;
pub use traits::DirectoryParser;
pub use traits::ParseContext;
pub use traits::parser_for;
