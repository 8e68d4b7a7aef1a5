//! Terminal rendering of workflow progress.

use crate::cli::OutputManager;
use crate::error::ReleaseError;
use crate::steps::StepReporter;

/// Prints workflow progress through an [`OutputManager`]
pub struct CliReporter<'a> {
    output: &'a OutputManager,
}

impl<'a> CliReporter<'a> {
    /// Reporter printing through `output`
    pub fn new(output: &'a OutputManager) -> Self {
        Self { output }
    }
}

impl StepReporter for CliReporter<'_> {
    fn on_workflow(&self, title: &str) {
        self.output.section(title);
    }

    fn on_step_started(&self, index: usize, total: usize, id: &str, description: &str) {
        self.output.println("");
        self.output.info(&format!("[{index}/{total}] {description} ({id})"));
    }

    fn on_step_skipped(&self, _id: &str) {
        self.output.indent("Skipping - already done.");
    }

    fn on_step_completed(&self, id: &str) {
        self.output.success(&format!("{id} done"));
    }

    fn on_step_failed(&self, id: &str, error: &ReleaseError) {
        self.output.error(&format!("{id} failed: {error}"));
    }

    fn on_message(&self, message: &str) {
        self.output.println(message);
    }

    fn on_warning(&self, message: &str) {
        self.output.warn(message);
    }
}
