//! Operator approval.
//!
//! Steps that need a human decision go through [`ApprovalProvider`]. The CLI answers with
//! terminal prompts; tests script the answers.

use crate::error::{Result, WorkflowError};

/// Blocking operator interaction
pub trait ApprovalProvider {
    /// Ask a yes/no question
    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Let the operator pick one of `options`; returns its index
    fn choose(&self, prompt: &str, options: &[&str]) -> Result<usize>;

    /// Ask for free text, offering `default`
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Let the operator edit `text`; returns the edited text
    fn edit(&self, text: &str) -> Result<String>;
}

/// Ask until the operator answers yes
pub fn require_confirmation(approval: &dyn ApprovalProvider, prompt: &str) -> Result<()> {
    while !approval.confirm(prompt)? {}
    Ok(())
}

/// Ask once; a no aborts the run
pub fn confirm_or_abort(approval: &dyn ApprovalProvider, prompt: &str) -> Result<()> {
    if approval.confirm(prompt)? {
        Ok(())
    } else {
        Err(WorkflowError::Aborted {
            reason: prompt.to_string(),
        }
        .into())
    }
}
