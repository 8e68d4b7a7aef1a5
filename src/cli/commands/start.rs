//! Start command implementation.

use super::helpers::{Backends, interruptible};
use crate::cli::{CliReporter, RuntimeConfig, TerminalApproval};
use crate::error::{Result, WorkflowError};
use crate::state::StateManager;
use crate::workflow::{CycleServices, NewRelease, start_release};

/// Execute start command
pub(super) async fn execute_start(release_id: Option<String>, date: Option<String>, config: &RuntimeConfig) -> Result<()> {
    let settings = config.promotion();
    let output = config.output();
    let store = StateManager::new(&settings.state_file);
    let mut release = store.load()?;
    if release.is_in_progress() {
        return Err(WorkflowError::ReleaseInProgress { id: release.id }.into());
    }

    let backends = Backends::from_config(settings)?;
    let reporter = CliReporter::new(output);
    let today = chrono::Local::now().date_naive();

    interruptible(start_release(
        &mut release,
        &store,
        settings,
        CycleServices {
            vcs: backends.vcs(),
            approval: &TerminalApproval,
            reporter: &reporter,
        },
        NewRelease { id: release_id, date },
        today,
    ))
    .await?;

    let versions: Vec<&str> = release.active_branches().map(|b| b.version.as_str()).collect();
    output.success(&format!(
        "Release {} started with {} branch(es): {}",
        release.id,
        versions.len(),
        versions.join(", ")
    ));
    Ok(())
}
