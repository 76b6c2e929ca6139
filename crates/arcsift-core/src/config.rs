//! Resource limits and parsing policy.

/// Limits applied while parsing directories and decoding entries.
///
/// Archive headers are untrusted input; every length, offset and count read
/// from them is checked against these limits before it is used.
///
/// # Examples
///
/// ```
/// use arcsift_core::SecurityConfig;
///
/// // Use secure defaults
/// let config = SecurityConfig::default();
///
/// // Customize for specific needs
/// let custom = SecurityConfig {
///     max_entry_size: 100 * 1024 * 1024, // 100 MB
///     lenient_listing: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Maximum number of entries a directory may declare.
    pub max_entry_count: usize,

    /// Maximum decoded size of a single entry in bytes.
    pub max_entry_size: u64,

    /// Maximum size of an inflated tar stream (`.tar.gz` and friends).
    pub max_total_size: u64,

    /// Maximum compression ratio allowed (uncompressed / compressed).
    pub max_compression_ratio: f64,

    /// Fall back to the file extension when no magic signature matches.
    ///
    /// Only formats without a reliable signature (pre-POSIX tar) are
    /// eligible.
    pub extension_fallback: bool,

    /// Skip unreadable directory records instead of failing the listing.
    pub lenient_listing: bool,
}

impl Default for SecurityConfig {
    /// Creates a `SecurityConfig` with secure default settings.
    ///
    /// Default values:
    /// - `max_entry_count`: 100,000
    /// - `max_entry_size`: 1 GiB
    /// - `max_total_size`: 4 GiB
    /// - `max_compression_ratio`: 1000.0
    /// - `extension_fallback`: true
    /// - `lenient_listing`: false
    fn default() -> Self {
        Self {
            max_entry_count: 100_000,
            max_entry_size: 1024 * 1024 * 1024,     // 1 GiB
            max_total_size: 4 * 1024 * 1024 * 1024, // 4 GiB
            max_compression_ratio: 1000.0,
            extension_fallback: true,
            lenient_listing: false,
        }
    }
}

impl SecurityConfig {
    /// Creates a permissive configuration for trusted archives.
    ///
    /// Size and ratio limits are lifted; the entry-count ceiling stays in
    /// place because it bounds directory allocation.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_entry_size: u64::MAX,
            max_total_size: u64::MAX,
            max_compression_ratio: f64::INFINITY,
            lenient_listing: true,
            ..Default::default()
        }
    }

    /// Rejects a directory that declares more entries than allowed.
    pub(crate) fn check_entry_count(&self, declared: u64) -> crate::Result<()> {
        let within = usize::try_from(declared).is_ok_and(|n| n <= self.max_entry_count);
        if within {
            Ok(())
        } else {
            Err(crate::ArchiveError::QuotaExceeded {
                resource: crate::QuotaResource::EntryCount {
                    declared,
                    max: self.max_entry_count,
                },
            })
        }
    }
}
