//! External build system.
//!
//! The workflows only need two questions answered: which evaluation built a given commit,
//! and how the designated job of that evaluation ended. [`HydraClient`] answers them from
//! Hydra's JSON API.

mod client;

pub use client::HydraClient;

use crate::error::Result;
use std::future::Future;

/// State of one job within an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStatus {
    /// The build has finished, successfully or not
    pub finished: bool,
    /// The build finished without error
    pub succeeded: bool,
    /// Name of the produced artifact, e.g. `release-24.11.2025abcd`
    pub artifact_name: String,
}

/// Build system operations consumed by the promotion workflow
pub trait BuildSystem {
    /// Evaluation of `branch` that built `commit`, if one exists yet
    fn find_evaluation(&self, branch: &str, commit: &str) -> impl Future<Output = Result<Option<String>>>;

    /// Status of `job` in evaluation `eval_id`
    fn get_build(&self, eval_id: &str, job: &str) -> impl Future<Output = Result<BuildStatus>>;

    /// Page an operator can open to watch evaluations of `branch`
    fn evaluations_url(&self, branch: &str) -> String;

    /// Page an operator can open to watch `job` of `eval_id`
    fn build_url(&self, eval_id: &str, job: &str) -> String;
}
