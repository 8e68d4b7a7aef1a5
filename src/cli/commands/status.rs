//! Status command implementation.
//!
//! Displays the stored release and the progress of each branch.

use crate::cli::RuntimeConfig;
use crate::error::{ReleaseError, Result};
use crate::state::{Branch, StateManager};
use crate::workflow::BRANCH_STEPS;

fn branch_status(branch: &Branch) -> &'static str {
    if branch.ignored {
        "ignored"
    } else if branch.tested {
        "tested"
    } else {
        "untested"
    }
}

/// Execute status command
pub(super) fn execute_status(json: bool, config: &RuntimeConfig) -> Result<()> {
    let settings = config.promotion();
    let output = config.output();
    let store = StateManager::new(&settings.state_file);
    let release = store.load()?;

    if json {
        let document = serde_json::to_string_pretty(&release).map_err(ReleaseError::Json)?;
        println!("{document}");
        return Ok(());
    }

    if release.id.is_empty() {
        output.println("No release found");
        return Ok(());
    }

    output.section("Release status");
    output.println(&format!("{:>14}: {}", "Release", release.id));
    let date = release.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
    output.println(&format!("{:>14}: {date}", "Date"));
    output.println(&format!("{:>14}: {}", "Stage", release.stage));
    if let (Some(year), Some(number)) = (release.year(), release.number()) {
        output.println(&format!("{:>14}: {}", "Changelog", settings.changelog_url_for(year, number)));
    }

    if release.branches.is_empty() {
        output.println("\nNo branches in this release");
        return Ok(());
    }

    output.println("");
    output.println(&format!(
        "{:<8} {:<9} {:>6}  {:<12} {:<12} {}",
        "Version", "Status", "Steps", "Staging", "Production", "Eval"
    ));
    for branch in release.branches.values() {
        output.println(&format!(
            "{:<8} {:<9} {:>6}  {:<12} {:<12} {}",
            branch.version,
            branch_status(branch),
            format!("{}/{}", branch.steps.len(), BRANCH_STEPS.len()),
            short(branch.orig_staging_commit.as_deref()),
            short(branch.new_production_commit.as_deref()),
            branch.hydra_eval_id.as_deref().unwrap_or("-"),
        ));
    }
    Ok(())
}

fn short(commit: Option<&str>) -> &str {
    match commit {
        Some(c) if c.len() > 12 => &c[..12],
        Some(c) => c,
        None => "-",
    }
}
