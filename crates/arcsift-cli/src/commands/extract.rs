//! Extract command implementation.
//!
//! A missing password is not fatal when a person is at the terminal: the
//! command asks for one and retries, and asks again after a wrong guess.

use crate::cli::ExtractArgs;
use crate::error::convert_archive_error;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use arcsift_core::ArchiveError;
use arcsift_core::ExtractionResult;
use arcsift_core::SecurityConfig;
use arcsift_core::Unarchiver;
use console::Term;
use console::style;
use std::env;
use std::path::Path;

const MAX_PROMPTS: usize = 3;

pub fn execute(
    args: &ExtractArgs,
    formatter: &dyn OutputFormatter,
    interactive: bool,
) -> Result<()> {
    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to get current directory")?,
    };

    let mut config = SecurityConfig {
        max_compression_ratio: f64::from(args.max_compression_ratio),
        ..SecurityConfig::default()
    };
    if let Some(max) = args.max_entry_size {
        config.max_entry_size = max;
    }

    let mut unarchiver = Unarchiver::with_config(config);
    if let Some(password) = &args.password {
        unarchiver.set_password(&args.archive, password.as_str());
    }

    let may_prompt = interactive && !args.no_prompt && args.password.is_none();
    let mut prompts = 0;
    let written = loop {
        match unarchiver.extract_file(&args.archive, args.index, &output_dir) {
            Ok(path) => break path,
            Err(err) if may_prompt && prompts < MAX_PROMPTS && wants_password(&err, prompts) => {
                prompts += 1;
                let password = prompt_password(&args.archive, prompts > 1)?;
                unarchiver.set_password(&args.archive, password);
            }
            Err(err) => return Err(convert_archive_error(err, &args.archive)),
        }
    };

    let bytes_written = if written.is_dir() {
        0
    } else {
        std::fs::metadata(&written)
            .with_context(|| format!("failed to stat {}", written.display()))?
            .len()
    };
    formatter.format_extraction_result(&ExtractionResult::new(written, bytes_written))
}

/// A first missing password always prompts; after that, only a wrong one.
const fn wants_password(err: &ArchiveError, prompts: usize) -> bool {
    match err {
        ArchiveError::PasswordRequired { .. } => true,
        ArchiveError::IncorrectPassword { .. } => prompts > 0,
        _ => false,
    }
}

/// Prompting only happens at a terminal, so the retry notice goes to stderr
/// beside the prompt rather than through the output formatter.
fn prompt_password(archive: &Path, retry: bool) -> Result<String> {
    let term = Term::stderr();
    if retry {
        term.write_line(&format!(
            "{} incorrect password, try again",
            style("⚠").yellow().bold()
        ))?;
    }
    term.write_str(&format!("Password for {}: ", archive.display()))?;
    term.read_secure_line()
        .context("failed to read password from terminal")
}
