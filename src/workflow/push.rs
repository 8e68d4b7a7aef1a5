//! Pushing the promoted branches.
//!
//! Each branch is first pushed with `--dry-run`. A rejection because the remote moved ahead
//! is repaired by fetching and rebasing, but only for branches that may be rebased.
//! Production advances only through this workflow, so a diverged production remote stops
//! the run for manual investigation.

use crate::error::{GitError, Result};
use crate::git::{PushFailure, VersionControl, classify_push_error};
use crate::steps::StepReporter;

const REMOTE: &str = "origin";

/// A branch to push and whether a diverged remote may be rebased onto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    /// Branch name
    pub branch: String,
    /// Rebase local commits when the remote diverged
    pub can_rebase: bool,
}

/// Push `targets` in order, stopping at the first failure
pub async fn push_all<V: VersionControl>(vcs: &V, reporter: &dyn StepReporter, targets: &[PushTarget]) -> Result<()> {
    for target in targets {
        push_with_retry(vcs, reporter, &target.branch, target.can_rebase).await?;
    }
    Ok(())
}

/// Push one branch, rebasing once if the dry run shows a diverged remote and `can_rebase` allows it
pub async fn push_with_retry<V: VersionControl>(
    vcs: &V,
    reporter: &dyn StepReporter,
    branch: &str,
    can_rebase: bool,
) -> Result<()> {
    reporter.on_message(&format!("Dry-run push for {branch}..."));

    if let Err(err) = vcs.push(REMOTE, branch, true).await {
        let output = match &err {
            crate::error::ReleaseError::Git(git) => git.output().unwrap_or_default().to_string(),
            other => other.to_string(),
        };
        match classify_push_error(&err) {
            PushFailure::Other => {
                log::error!("Dry-run push of {branch} failed unexpectedly");
                return Err(GitError::UnexpectedPushFailure {
                    branch: branch.to_string(),
                    output,
                }
                .into());
            }
            PushFailure::Diverged if !can_rebase => {
                return Err(GitError::ProductionDivergence {
                    branch: branch.to_string(),
                    output,
                }
                .into());
            }
            PushFailure::Diverged => {
                reporter.on_warning(&format!("Remote {branch} has diverged, rebasing onto it first"));
                vcs.checkout(branch, false, false).await?;
                vcs.fetch_branch(REMOTE, branch).await?;
                vcs.rebase(&format!("{REMOTE}/{branch}")).await?;
                reporter.on_message(&format!("Rebased {branch}"));
            }
        }
    }

    reporter.on_message(&format!("Pushing {branch}..."));
    if let Err(err) = vcs.push(REMOTE, branch, false).await {
        log::error!("Push of {branch} failed after a clean dry run: {err}");
        return Err(err);
    }
    reporter.on_message(&format!("Pushed {branch}"));
    Ok(())
}
