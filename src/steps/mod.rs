//! Resumable step execution.
//!
//! A workflow is an explicit, ordered table of [`StepDef`]s bound to an entity that records
//! which steps have completed. [`StepRunner`] walks the table, skips completed steps, and has
//! the workflow persist its entity after every step that succeeds.
//!
//! Step identifiers are stored in the state document. Renaming one orphans its completion
//! record, so the identifiers in the tables are part of the persisted format.

mod reporter;

pub use reporter::{NoopReporter, StepReporter};

use crate::error::Result;
use std::fmt;
use std::future::Future;

/// Identifier of a step within one workflow type
pub trait StepId: Copy + Eq + fmt::Debug + 'static {
    /// Stable identifier written to the state document
    fn as_str(&self) -> &'static str;
}

/// One row of a workflow's step table
#[derive(Debug, Clone, Copy)]
pub struct StepDef<S> {
    /// Stable identifier
    pub id: S,
    /// Human readable description; may contain `{placeholders}` expanded by the workflow
    pub description: &'static str,
    /// Skip the step when it is already recorded as completed
    pub skip_if_done: bool,
}

impl<S: StepId> StepDef<S> {
    /// Step that is skipped once completed
    pub const fn new(id: S, description: &'static str) -> Self {
        Self {
            id,
            description,
            skip_if_done: true,
        }
    }

    /// Step that runs on every invocation
    pub const fn always(id: S, description: &'static str) -> Self {
        Self {
            id,
            description,
            skip_if_done: false,
        }
    }
}

/// A sequence of steps bound to a persisted entity
pub trait Workflow {
    /// Step identifier type
    type Step: StepId;

    /// Title printed before the first step
    fn title(&self) -> String;

    /// Ordered step table
    fn steps(&self) -> &'static [StepDef<Self::Step>];

    /// Whether the bound entity records `step` as completed
    fn is_done(&self, step: Self::Step) -> bool;

    /// Description of `def` expanded against the bound entity
    fn describe(&self, def: &StepDef<Self::Step>) -> String;

    /// Run the body of `step`
    fn execute(&mut self, step: Self::Step) -> impl Future<Output = Result<()>>;

    /// Record `step` as completed and persist the entity
    fn complete(&mut self, step: Self::Step) -> Result<()>;
}

/// Outcome of a workflow run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps whose bodies ran, in order
    pub executed: Vec<&'static str>,
    /// Steps skipped because they were already completed
    pub skipped: Vec<&'static str>,
}

/// Executes workflows step by step
pub struct StepRunner<'a> {
    reporter: &'a dyn StepReporter,
}

impl<'a> StepRunner<'a> {
    /// Create a runner that reports progress to `reporter`
    pub fn new(reporter: &'a dyn StepReporter) -> Self {
        Self { reporter }
    }

    /// Run `workflow` from its first incomplete step.
    ///
    /// A failing step stops the run; state persisted by earlier steps is left as is.
    pub async fn run<W: Workflow>(&self, workflow: &mut W) -> Result<RunSummary> {
        let steps = workflow.steps();
        let total = steps.len();
        let mut summary = RunSummary::default();

        self.reporter.on_workflow(&workflow.title());

        for (index, def) in steps.iter().enumerate() {
            let id = def.id.as_str();
            self.reporter
                .on_step_started(index + 1, total, id, &workflow.describe(def));

            if def.skip_if_done && workflow.is_done(def.id) {
                log::debug!("Skipping completed step {id}");
                self.reporter.on_step_skipped(id);
                summary.skipped.push(id);
                continue;
            }

            log::info!("Running step {id}");
            if let Err(e) = workflow.execute(def.id).await {
                log::debug!("Step {id} failed: {e}");
                self.reporter.on_step_failed(id, &e);
                return Err(e);
            }
            workflow.complete(def.id)?;
            self.reporter.on_step_completed(id);
            summary.executed.push(id);
        }

        Ok(summary)
    }
}

/// Replace `{key}` placeholders in `template` with the given values
pub fn expand_template(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
}
