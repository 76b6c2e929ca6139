//! Detect command implementation

use crate::cli::DetectArgs;
use crate::error::add_archive_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use arcsift_core::SecurityConfig;
use arcsift_core::Unarchiver;

pub fn execute(args: &DetectArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let config = SecurityConfig {
        extension_fallback: !args.no_extension_fallback,
        ..SecurityConfig::default()
    };

    let format = add_archive_context(
        Unarchiver::with_config(config).detect_format(&args.archive),
        &args.archive,
    )?;

    formatter.format_detection(&args.archive, format)
}
