//! Command line interface.
//!
//! Parses arguments, wires the production collaborators and renders progress and errors
//! on the terminal.

mod args;
pub mod commands;
mod output;
mod prompt;
mod reporter;

pub use args::{Args, Command, RuntimeConfig};
pub use commands::{EXIT_INTERRUPTED, execute_command};
pub use output::OutputManager;
pub use prompt::TerminalApproval;
pub use reporter::CliReporter;

use crate::error::Result;

/// Main CLI entry point; returns the process exit code
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
