//! Branch command implementation.
//!
//! Runs the promotion workflow for one platform version, resuming after the last completed
//! step. `--reset-from` forgets a step and all later ones first.

use super::helpers::{Backends, interruptible, load_active_release};
use crate::cli::{CliReporter, RuntimeConfig, TerminalApproval};
use crate::error::Result;
use crate::state::StateManager;
use crate::steps::StepRunner;
use crate::workflow::{BranchWorkflow, branch_step_ids};

/// Execute branch command
pub(super) async fn execute_branch(version: &str, reset_from: Option<&str>, config: &RuntimeConfig) -> Result<()> {
    let settings = config.promotion();
    let output = config.output();
    let store = StateManager::new(&settings.state_file);
    let mut release = load_active_release(&store)?;

    if release.branch(version)?.ignored {
        output.warn(&format!("{version} is ignored in release {}. Nothing to do.", release.id));
        return Ok(());
    }

    if let Some(step) = reset_from {
        let cleared = release.branch_mut(version)?.reset_from(step, &branch_step_ids())?;
        store.save(&release)?;
        output.info(&format!("Forgot steps of {version}: {}", cleared.join(", ")));
    }

    let backends = Backends::from_config(settings)?;
    let reporter = CliReporter::new(output);
    let approval = TerminalApproval;
    let services = backends.services(&approval, &reporter);

    let mut workflow = BranchWorkflow::new(&mut release, version, &store, settings, services)?;
    let summary = interruptible(StepRunner::new(&reporter).run(&mut workflow)).await?;
    output.verbose(&format!(
        "Executed {} step(s), skipped {}",
        summary.executed.len(),
        summary.skipped.len()
    ));
    output.success(&format!("{version} is released and tested"));
    Ok(())
}
