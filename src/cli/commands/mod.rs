//! Command executors.
//!
//! Each executor loads the state file, runs one operation and reports the outcome. Errors are
//! rendered here; only the exit code travels back to `main`.

mod branch;
mod doc;
mod helpers;
mod ignore;
mod start;
mod status;

use crate::cli::{Args, Command, OutputManager, RuntimeConfig};
use crate::error::Result;

use branch::execute_branch;
use doc::execute_doc;
use ignore::execute_ignore;
use start::execute_start;
use status::execute_status;

/// Exit code after Ctrl-C
pub const EXIT_INTERRUPTED: i32 = 130;

/// Execute the command selected by `args`
pub async fn execute_command(args: Args) -> Result<i32> {
    let config = RuntimeConfig::from_args(&args)?;
    let output = config.output();
    output.verbose(&format!("State file: {}", config.promotion().state_file.display()));

    let result = match &args.command {
        Command::Start { release_id, date } => execute_start(release_id.clone(), date.clone(), &config).await,
        Command::Status { json } => execute_status(*json, &config),
        Command::Branch { version, reset_from } => execute_branch(version, reset_from.as_deref(), &config).await,
        Command::Ignore { version } => execute_ignore(version, &config),
        Command::Doc => execute_doc(&config).await,
    };

    Ok(exit_code(args.command.name(), result, output))
}

/// Report the outcome of `command` and map it to a process exit code
fn exit_code(command: &str, result: Result<()>, output: &OutputManager) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) if e.is_interrupted() => {
            output.warn("Interrupted. Progress up to the last completed step is saved.");
            EXIT_INTERRUPTED
        }
        Err(e) => {
            output.error(&format!("Command '{command}' failed: {e}"));
            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    output.indent(&format!("• {suggestion}"));
                }
            }
            1
        }
    }
}
