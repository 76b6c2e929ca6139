//! Arcsift CLI - inspect archives and extract single entries.

mod cli;
mod commands;
mod error;
mod logger;
mod output;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logger::init(cli.verbose, cli.quiet);

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);
    let interactive = !cli.json && console::user_attended_stderr();

    match &cli.command {
        cli::Commands::Detect(args) => commands::detect::execute(args, &*formatter),
        cli::Commands::List(args) => commands::list::execute(args, &*formatter),
        cli::Commands::Extract(args) => {
            commands::extract::execute(args, &*formatter, interactive)
        }
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    }
}
