//! Shared helper functions for command execution.

use crate::approval::ApprovalProvider;
use crate::config::PromotionConfig;
use crate::error::{CliError, ReleaseError, Result, WorkflowError};
use crate::fleet::SshFleet;
use crate::git::GitCli;
use crate::hydra::HydraClient;
use crate::metadata::MetadataClient;
use crate::state::{Release, StateManager};
use crate::steps::StepReporter;
use crate::workflow::Services;
use std::future::Future;
use url::Url;

/// Production implementations of every collaborator
pub(super) struct Backends {
    vcs: GitCli,
    builds: HydraClient,
    fleet: SshFleet,
    metadata: MetadataClient,
}

impl Backends {
    pub(super) fn from_config(config: &PromotionConfig) -> Result<Self> {
        which::which("git").map_err(|_| CliError::MissingExecutable {
            name: "git".to_string(),
        })?;
        let hydra = Url::parse(&config.hydra_url).map_err(|e| CliError::InvalidArguments {
            reason: format!("invalid Hydra URL '{}': {e}", config.hydra_url),
        })?;

        Ok(Self {
            vcs: GitCli::new(config.repo_dir(), Some(config.commands_log())),
            builds: HydraClient::new(hydra, config.hydra_project.clone()),
            fleet: SshFleet::new(config.machine_scan, config.inventory_host.clone()),
            metadata: MetadataClient::new()?,
        })
    }

    pub(super) fn vcs(&self) -> &GitCli {
        &self.vcs
    }

    pub(super) fn services<'a>(
        &'a self,
        approval: &'a dyn ApprovalProvider,
        reporter: &'a dyn StepReporter,
    ) -> Services<'a, GitCli, HydraClient, SshFleet, MetadataClient> {
        Services {
            vcs: &self.vcs,
            builds: &self.builds,
            fleet: &self.fleet,
            metadata: &self.metadata,
            approval,
            reporter,
        }
    }
}

/// Load the release, which must be in progress
pub(super) fn load_active_release(store: &StateManager) -> Result<Release> {
    let release = store.load()?;
    if release.is_in_progress() {
        Ok(release)
    } else {
        Err(WorkflowError::NoActiveRelease.into())
    }
}

/// Run `work` until it finishes or the operator presses Ctrl-C
pub(super) async fn interruptible<T>(work: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        result = work => result,
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(ReleaseError::Io)?;
            log::debug!("Received Ctrl-C");
            Err(WorkflowError::Interrupted.into())
        }
    }
}
