//! Entry Reader: locates an entry's raw bytes in the source.

use crate::ArchiveError;
use crate::Result;
use crate::source::ByteSource;
use crate::types::EntryDescriptor;
use crate::types::EntryLocation;

/// Raw (still compressed, possibly encrypted) content of one entry.
#[derive(Debug)]
pub(crate) enum RawEntry<'a> {
    /// The bytes of a contiguous span.
    Bytes(Vec<u8>),
    /// The entry lives in a 7z block; decoding needs the whole source.
    Block(&'a mut ByteSource),
    /// The entry has no content.
    Empty,
}

/// Reads the raw content described by `entry`.
///
/// # Errors
///
/// - `TruncatedArchive` if the span extends past the end of the source
/// - `UnsupportedFeature` for entries whose data is out of reach (split
///   volumes, device nodes)
pub(crate) fn read_raw<'a>(
    source: &'a mut ByteSource,
    entry: &EntryDescriptor,
) -> Result<RawEntry<'a>> {
    match *entry.location() {
        EntryLocation::Span { offset, length } => {
            source.check_span(offset, length)?;
            Ok(RawEntry::Bytes(source.read_span(offset, length)?))
        }
        EntryLocation::Block { block: Some(_) } => Ok(RawEntry::Block(source)),
        EntryLocation::Block { block: None } => Ok(RawEntry::Empty),
        EntryLocation::Unavailable { reason } => Err(ArchiveError::UnsupportedFeature(format!(
            "{}: {reason}",
            entry.name()
        ))),
    }
}
