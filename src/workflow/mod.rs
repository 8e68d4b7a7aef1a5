//! Promotion workflows.
//!
//! [`BranchWorkflow`] drives one platform version from pending to tested; [`DocWorkflow`]
//! aggregates the tested branches into the release changelog. Both run on the generic
//! [`StepRunner`](crate::steps::StepRunner).

mod branch;
mod convergence;
mod cycle;
mod doc;
mod polling;
mod push;

pub use branch::{BRANCH_STEPS, BranchStep, BranchWorkflow, branch_step_ids};
pub use convergence::verify_machines_current;
pub use cycle::{CycleServices, NewRelease, discover_versions, ignore_branch, release_checklist, start_release};
pub use doc::{DOC_STEPS, DocStep, DocWorkflow, aggregate_changelog};
pub use polling::{PollSettings, wait_for_successful_build};
pub use push::{PushTarget, push_all, push_with_retry};

use crate::approval::ApprovalProvider;
use crate::changelog::{ChangelogTree, EDITOR_HEADER};
use crate::error::Result;
use crate::steps::StepReporter;

/// Collaborators a workflow talks to
pub struct Services<'a, V, B, F, M> {
    /// Repository
    pub vcs: &'a V,
    /// Build system
    pub builds: &'a B,
    /// Release test machines
    pub fleet: &'a F,
    /// Release metadata endpoint
    pub metadata: &'a M,
    /// Operator decisions
    pub approval: &'a dyn ApprovalProvider,
    /// Operator-facing output
    pub reporter: &'a dyn StepReporter,
}

impl<V, B, F, M> Clone for Services<'_, V, B, F, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V, B, F, M> Copy for Services<'_, V, B, F, M> {}

/// Hand `tree` to the operator's editor and parse the result
pub(crate) fn edit_changelog(approval: &dyn ApprovalProvider, tree: &ChangelogTree) -> Result<ChangelogTree> {
    let text = format!("{EDITOR_HEADER}\n\n{}", tree.render());
    let edited = approval.edit(&text)?;
    Ok(ChangelogTree::parse(&edited))
}

/// Show `tree` until the operator chooses to continue, editing on request
pub(crate) fn review_changelog(
    approval: &dyn ApprovalProvider,
    reporter: &dyn StepReporter,
    mut tree: ChangelogTree,
    prompt: &str,
) -> Result<ChangelogTree> {
    loop {
        reporter.on_message(&tree.render());
        match approval.choose(prompt, &["edit", "continue"])? {
            0 => tree = edit_changelog(approval, &tree)?,
            _ => return Ok(tree),
        }
    }
}
