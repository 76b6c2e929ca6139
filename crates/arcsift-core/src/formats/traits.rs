//! The directory-parser capability shared by all formats.

use crate::Result;
use crate::SecurityConfig;
use crate::formats::ArchiveFormat;
use crate::source::ByteSource;
use crate::types::EntryDescriptor;
use crate::types::Password;

/// Inputs a parser may consult besides the bytes themselves.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Limits and listing policy.
    pub config: &'a SecurityConfig,
    /// Session password. Only formats with encrypted directories read it.
    pub password: Option<&'a Password>,
}

/// Decodes one format's directory into ordered entry descriptors.
///
/// Implementations validate every length and offset against the source
/// before trusting it, and never decrypt entry data.
pub trait DirectoryParser {
    /// Format handled by this parser.
    fn format(&self) -> ArchiveFormat;

    /// Turns the opened file into the source the parser and the entry reader
    /// work on. The default keeps the file as is.
    fn prepare(&self, source: ByteSource, _config: &SecurityConfig) -> Result<ByteSource> {
        Ok(source)
    }

    /// Parses the directory, preserving on-disk order.
    ///
    /// # Errors
    ///
    /// `CorruptArchive`, `TruncatedArchive`, `UnsupportedFeature` or
    /// `QuotaExceeded` for hostile or damaged input.
    fn parse(
        &self,
        source: &mut ByteSource,
        ctx: &ParseContext<'_>,
    ) -> Result<Vec<EntryDescriptor>>;
}

/// Returns the parser registered for `format`.
#[must_use]
pub fn parser_for(format: ArchiveFormat) -> Box<dyn DirectoryParser> {
    match format {
        ArchiveFormat::Zip => Box::new(super::zip::ZipParser),
        ArchiveFormat::SevenZ => Box::new(super::sevenz::SevenZParser),
        ArchiveFormat::Rar => Box::new(super::rar::RarParser),
        ArchiveFormat::Tar
        | ArchiveFormat::TarGz
        | ArchiveFormat::TarBz2
        | ArchiveFormat::TarXz
        | ArchiveFormat::TarZst => Box::new(super::tar::TarParser::new(format)),
    }
}
