//! Subcommand implementations.

pub mod completion;
pub mod detect;
pub mod extract;
pub mod list;
