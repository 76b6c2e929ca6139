//! List command implementation

use crate::cli::ListArgs;
use crate::error::add_archive_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use arcsift_core::SecurityConfig;
use arcsift_core::Unarchiver;

pub fn execute(args: &ListArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let config = SecurityConfig {
        max_entry_count: args.max_entries,
        lenient_listing: args.lenient,
        ..SecurityConfig::default()
    };

    let mut unarchiver = Unarchiver::with_config(config);
    if let Some(password) = &args.password {
        unarchiver.set_password(&args.archive, password.as_str());
    }

    let entries = add_archive_context(unarchiver.list_contents(&args.archive), &args.archive)?;

    if args.long {
        formatter.format_entries_long(&entries, args.human_readable)
    } else {
        formatter.format_entries_short(&entries)
    }
}
