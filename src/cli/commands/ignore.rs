//! Ignore command implementation.

use super::helpers::load_active_release;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::state::StateManager;
use crate::workflow::ignore_branch;

/// Execute ignore command
pub(super) fn execute_ignore(version: &str, config: &RuntimeConfig) -> Result<()> {
    let store = StateManager::new(&config.promotion().state_file);
    let mut release = load_active_release(&store)?;
    ignore_branch(&mut release, &store, version)?;
    config
        .output()
        .success(&format!("{version} will be left out of release {}", release.id));
    Ok(())
}
