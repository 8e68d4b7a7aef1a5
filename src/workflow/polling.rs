//! Waiting for the build system.
//!
//! Two phases with the same shape: poll until an evaluation for the commit exists, then poll
//! until its job has finished. Without a timeout the wait is bounded only by the operator
//! interrupting the run.

use crate::error::{BuildError, Result};
use crate::hydra::BuildSystem;
use crate::state::BuildDescriptor;
use crate::steps::StepReporter;
use std::time::Duration;
use tokio::time::Instant;

/// Polling cadence and bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between two polls
    pub interval: Duration,
    /// Give up after this long in one phase; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: None,
        }
    }
}

struct Deadline {
    started: Instant,
    timeout: Option<Duration>,
}

impl Deadline {
    fn start(timeout: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    fn check(&self, what: impl FnOnce() -> String) -> Result<()> {
        match self.timeout {
            Some(limit) if self.started.elapsed() >= limit => Err(BuildError::Timeout {
                what: what(),
                waited_secs: self.started.elapsed().as_secs(),
            }
            .into()),
            _ => Ok(()),
        }
    }
}

/// Wait until `job` has built `commit` of `branch` successfully.
///
/// A finished build with a failure status ends the wait with [`BuildError::BuildFailed`].
pub async fn wait_for_successful_build<B: BuildSystem>(
    builds: &B,
    reporter: &dyn StepReporter,
    branch: &str,
    commit: &str,
    job: &str,
    settings: PollSettings,
) -> Result<BuildDescriptor> {
    reporter.on_message(&format!(
        "Waiting for an evaluation of {branch} at {commit}. Watch it at {}",
        builds.evaluations_url(branch)
    ));

    let deadline = Deadline::start(settings.timeout);
    let eval_id = loop {
        if let Some(id) = builds.find_evaluation(branch, commit).await? {
            break id;
        }
        deadline.check(|| format!("an evaluation of {branch} at {commit}"))?;
        log::debug!("No evaluation for {commit} yet, retrying in {:?}", settings.interval);
        tokio::time::sleep(settings.interval).await;
    };
    reporter.on_message(&format!("Found matching evaluation {eval_id}"));

    reporter.on_message(&format!(
        "Waiting for job `{job}` to finish. Watch it at {}",
        builds.build_url(&eval_id, job)
    ));
    let deadline = Deadline::start(settings.timeout);
    loop {
        let build = builds.get_build(&eval_id, job).await?;
        if build.finished {
            if !build.succeeded {
                return Err(BuildError::BuildFailed {
                    branch: branch.to_string(),
                    commit: commit.to_string(),
                    eval_id,
                    job: job.to_string(),
                }
                .into());
            }
            return Ok(BuildDescriptor {
                eval_id,
                artifact_name: build.artifact_name,
            });
        }
        deadline.check(|| format!("job `{job}` of evaluation {eval_id}"))?;
        tokio::time::sleep(settings.interval).await;
    }
}
