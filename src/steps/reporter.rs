//! Interface-agnostic progress notifications for workflow runs.

use crate::error::ReleaseError;

/// Receives progress updates while a workflow runs.
///
/// The CLI prints them; tests use [`NoopReporter`]. Steps also route operator-facing text
/// through here so they stay independent of the terminal.
pub trait StepReporter {
    /// Called once before the first step
    fn on_workflow(&self, title: &str);

    /// Called before a step is executed or skipped
    fn on_step_started(&self, index: usize, total: usize, id: &str, description: &str);

    /// Called when a completed step is skipped
    fn on_step_skipped(&self, id: &str);

    /// Called after a step completed and was persisted
    fn on_step_completed(&self, id: &str);

    /// Called when a step failed
    fn on_step_failed(&self, id: &str, error: &ReleaseError);

    /// Informational text for the operator
    fn on_message(&self, message: &str);

    /// Non-fatal problem the operator should know about
    fn on_warning(&self, message: &str);
}

/// Reporter that discards everything
pub struct NoopReporter;

impl StepReporter for NoopReporter {
    fn on_workflow(&self, _title: &str) {}
    fn on_step_started(&self, _index: usize, _total: usize, _id: &str, _description: &str) {}
    fn on_step_skipped(&self, _id: &str) {}
    fn on_step_completed(&self, _id: &str) {}
    fn on_step_failed(&self, _id: &str, _error: &ReleaseError) {}
    fn on_message(&self, _message: &str) {}
    fn on_warning(&self, _message: &str) {}
}
