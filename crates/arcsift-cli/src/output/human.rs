//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use anyhow::Result;
use arcsift_core::ArchiveFormat;
use arcsift_core::EntryDescriptor;
use arcsift_core::EntryKind;
use arcsift_core::ExtractionResult;
use console::Term;
use console::style;
use std::path::Path;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: usize) -> String {
        let s = n.to_string();
        let mut result = String::new();
        let mut count = 0;

        for c in s.chars().rev() {
            if count == 3 {
                result.push(',');
                count = 0;
            }
            result.push(c);
            count += 1;
        }

        result.chars().rev().collect()
    }

    const fn type_char(kind: EntryKind) -> char {
        match kind {
            EntryKind::File => '-',
            EntryKind::Directory => 'd',
            EntryKind::Symlink => 'l',
            EntryKind::Hardlink => 'h',
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_detection(&self, archive: &Path, format: ArchiveFormat) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        if self.verbose {
            self.line(&format!("{}: {}", archive.display(), format.name()));
        } else {
            self.line(format.name());
        }
        Ok(())
    }

    fn format_entries_short(&self, entries: &[EntryDescriptor]) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        for entry in entries {
            self.line(&format!("{:>5}  {}", entry.index(), entry.name()));
        }
        Ok(())
    }

    fn format_entries_long(&self, entries: &[EntryDescriptor], human_readable: bool) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let size = |bytes: u64| {
            if human_readable {
                Self::format_size(bytes)
            } else {
                bytes.to_string()
            }
        };

        let mut total = 0u64;
        for entry in entries {
            total = total.saturating_add(entry.uncompressed_size());

            let lock = if entry.is_encrypted() {
                if self.use_colors {
                    style("*").yellow().bold().to_string()
                } else {
                    "*".to_string()
                }
            } else {
                " ".to_string()
            };

            self.line(&format!(
                "{:>5} {}{} {:>10} {:>10}  {:<10} {}",
                entry.index(),
                Self::type_char(entry.kind()),
                lock,
                size(entry.uncompressed_size()),
                size(entry.compressed_size()),
                entry.method().to_string(),
                entry.name()
            ));

            if self.verbose && entry.is_encrypted() {
                self.line(&format!("        encryption: {}", entry.encryption()));
            }
        }

        self.line("");
        self.line(&format!(
            "Total: {} entries, {}",
            Self::format_number(entries.len()),
            Self::format_size(total)
        ));
        Ok(())
    }

    fn format_extraction_result(&self, result: &ExtractionResult) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        if self.use_colors {
            self.line(&format!(
                "{} Extracted {}",
                style("✓").green().bold(),
                result.destination().display()
            ));
        } else {
            self.line(&format!("Extracted {}", result.destination().display()));
        }

        if self.verbose {
            self.line(&format!(
                "  Bytes written: {}",
                Self::format_size(result.bytes_written)
            ));
        }
        Ok(())
    }
}
