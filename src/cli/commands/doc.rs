//! Doc command implementation.

use super::helpers::{interruptible, load_active_release};
use crate::cli::{CliReporter, RuntimeConfig, TerminalApproval};
use crate::error::Result;
use crate::state::StateManager;
use crate::steps::StepRunner;
use crate::workflow::DocWorkflow;

/// Execute doc command
pub(super) async fn execute_doc(config: &RuntimeConfig) -> Result<()> {
    let settings = config.promotion();
    let output = config.output();
    let store = StateManager::new(&settings.state_file);
    let mut release = load_active_release(&store)?;

    let reporter = CliReporter::new(output);
    let mut workflow = DocWorkflow::new(&mut release, &store, settings, &TerminalApproval, &reporter);
    let path = workflow.changelog_path();
    interruptible(StepRunner::new(&reporter).run(&mut workflow)).await?;

    output.success(&format!("Release {} finished; changelog at {}", release.id, path.display()));
    Ok(())
}
