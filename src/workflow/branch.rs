//! Promotion of one platform version from staging to production.

use crate::approval::{confirm_or_abort, require_confirmation};
use crate::changelog::{
    CHANGELOG_FILE, ChangelogTree, CompareLinks, DETAILED_CHANGES, FRAGMENT_DIR, detailed_changes,
};
use crate::config::PromotionConfig;
use crate::error::{Result, WorkflowError};
use crate::fleet::MachineFleet;
use crate::git::VersionControl;
use crate::hydra::BuildSystem;
use crate::metadata::{ReleaseMetadata, metadata_url};
use crate::state::{Branch, Environment, Release, StateManager};
use crate::steps::{StepDef, StepId, Workflow, expand_template};
use crate::workflow::{
    PushTarget, Services, edit_changelog, push_all, review_changelog, verify_machines_current,
    wait_for_successful_build,
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Steps of the branch workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStep {
    /// Mirror upstream and reset the three branches
    Prepare,
    /// Show commits about to be promoted
    ReviewPendingCommits,
    /// Wait for the staging build
    CheckHydraStaging,
    /// Verify staging test machines
    CheckReleasetestMachines,
    /// Fold changelog fragments into the branch changelog
    CollectChangelog,
    /// Merge staging into production
    Merge,
    /// Merge production back into dev
    Backmerge,
    /// Add generated version diffs
    AddDetailedChangelog,
    /// Push dev, staging and production
    Push,
    /// Wait for the production build
    CheckHydraProduction,
    /// Operator registers the release in the inventory
    CreateDirectoryRelease,
    /// Verify production test machines
    VerifyProductionMachines,
    /// Add metadata and channel links
    UpdateChangelogWithUrls,
    /// Finish the branch
    MarkAsTested,
}

impl StepId for BranchStep {
    fn as_str(&self) -> &'static str {
        match self {
            BranchStep::Prepare => "prepare",
            BranchStep::ReviewPendingCommits => "review_pending_commits",
            BranchStep::CheckHydraStaging => "check_hydra_staging",
            BranchStep::CheckReleasetestMachines => "check_releasetest_machines",
            BranchStep::CollectChangelog => "collect_changelog",
            BranchStep::Merge => "merge",
            BranchStep::Backmerge => "backmerge",
            BranchStep::AddDetailedChangelog => "add_detailed_changelog",
            BranchStep::Push => "push",
            BranchStep::CheckHydraProduction => "check_hydra_production",
            BranchStep::CreateDirectoryRelease => "create_directory_release",
            BranchStep::VerifyProductionMachines => "verify_production_machines",
            BranchStep::UpdateChangelogWithUrls => "update_changelog_with_urls",
            BranchStep::MarkAsTested => "mark_as_tested",
        }
    }
}

/// Step table of the branch workflow, in execution order
pub static BRANCH_STEPS: &[StepDef<BranchStep>] = &[
    StepDef::new(BranchStep::Prepare, "Prepare {dev}, {staging} and {production}"),
    StepDef::new(BranchStep::ReviewPendingCommits, "Spot-check changes from {staging} to {production}"),
    StepDef::new(BranchStep::CheckHydraStaging, "Wait for clean build of {staging} on Hydra"),
    StepDef::new(BranchStep::CheckReleasetestMachines, "Verify release test staging machines are up to date"),
    StepDef::new(BranchStep::CollectChangelog, "Collect the changelog"),
    StepDef::new(BranchStep::Merge, "Merge {staging} into {production}"),
    StepDef::new(BranchStep::Backmerge, "Backmerge {production} into {dev}"),
    StepDef::new(BranchStep::AddDetailedChangelog, "Add detailed changelog"),
    StepDef::new(BranchStep::Push, "Push {dev}, {staging} and {production}"),
    StepDef::new(BranchStep::CheckHydraProduction, "Verify Hydra build of {production}"),
    StepDef::new(BranchStep::CreateDirectoryRelease, "Create directory release {release}"),
    StepDef::new(BranchStep::VerifyProductionMachines, "Verify production release test machines"),
    StepDef::new(BranchStep::UpdateChangelogWithUrls, "Add metadata and channel URLs to the changelog"),
    StepDef::new(BranchStep::MarkAsTested, "Mark {version} as tested"),
];

/// Identifiers of [`BRANCH_STEPS`] in order
pub fn branch_step_ids() -> Vec<&'static str> {
    BRANCH_STEPS.iter().map(|def| def.id.as_str()).collect()
}

/// Workflow bound to one branch of a release
pub struct BranchWorkflow<'a, V, B, F, M> {
    release: &'a mut Release,
    version: String,
    store: &'a StateManager,
    config: &'a PromotionConfig,
    services: Services<'a, V, B, F, M>,
}

impl<'a, V, B, F, M> BranchWorkflow<'a, V, B, F, M>
where
    V: VersionControl,
    B: BuildSystem,
    F: MachineFleet,
    M: ReleaseMetadata,
{
    /// Bind the workflow to `version`, which must be part of `release`
    pub fn new(
        release: &'a mut Release,
        version: &str,
        store: &'a StateManager,
        config: &'a PromotionConfig,
        services: Services<'a, V, B, F, M>,
    ) -> Result<Self> {
        release.branch(version)?;
        Ok(Self {
            release,
            version: version.to_string(),
            store,
            config,
            services,
        })
    }

    /// The bound branch
    pub fn branch(&self) -> Result<&Branch> {
        self.release.branch(&self.version)
    }

    fn branch_mut(&mut self) -> Result<&mut Branch> {
        self.release.branch_mut(&self.version)
    }

    fn persist(&self) -> Result<()> {
        self.store.save(self.release)
    }

    fn say(&self, message: &str) {
        self.services.reporter.on_message(message);
    }

    fn precondition(step: BranchStep, reason: impl Into<String>) -> crate::error::ReleaseError {
        WorkflowError::Precondition {
            step: step.as_str().to_string(),
            reason: reason.into(),
        }
        .into()
    }

    async fn prepare(&mut self) -> Result<()> {
        let vcs = self.services.vcs;
        let branch = self.branch()?.clone();

        vcs.ensure_mirror(&self.config.upstream_url).await?;
        for name in [branch.dev_branch(), branch.staging_branch(), branch.production_branch()] {
            vcs.checkout(&name, true, true).await?;
        }
        let staging_tip = vcs.rev_parse(&branch.staging_branch()).await?;

        let branch = self.branch_mut()?;
        if branch.capture_orig_staging(&staging_tip) {
            log::info!("Captured staging commit {staging_tip} for {}", branch.version);
        }
        let orig = branch.orig_staging_commit.clone().unwrap_or_default();
        self.say(&format!("Staging commit for this release: {orig}"));
        Ok(())
    }

    async fn review_pending_commits(&mut self) -> Result<()> {
        let vcs = self.services.vcs;
        let branch = self.branch()?;
        let (staging, production) = (branch.staging_branch(), branch.production_branch());

        vcs.checkout(&staging, false, false).await?;
        let commits = vcs.cherry_diff(&production, &staging).await?;
        if commits.is_empty() {
            self.services
                .reporter
                .on_warning(&format!("No commits pending between {staging} and {production}"));
        } else {
            self.say(&format!(
                "The following commits will be merged from {staging} to {production}:\n{}",
                commits.iter().map(|c| format!("  {c}")).collect::<Vec<_>>().join("\n")
            ));
        }
        require_confirmation(
            self.services.approval,
            "Have you spot-checked the commits for general sanity?",
        )
    }

    async fn check_hydra_staging(&mut self) -> Result<()> {
        let branch = self.branch()?;
        let staging = branch.staging_branch();
        let Some(commit) = branch.orig_staging_commit.clone() else {
            return Err(Self::precondition(BranchStep::CheckHydraStaging, "no staging commit captured; run prepare"));
        };

        let build = wait_for_successful_build(
            self.services.builds,
            self.services.reporter,
            &staging,
            &commit,
            &self.config.build_job,
            self.config.poll,
        )
        .await?;
        self.say(&format!("Detected green build {} ({})", build.eval_id, build.artifact_name));
        self.branch_mut()?.staging_build = Some(build);
        Ok(())
    }

    async fn check_releasetest_machines(&mut self) -> Result<()> {
        let branch = self.branch()?;
        let Some(build) = branch.staging_build.clone() else {
            return Err(Self::precondition(
                BranchStep::CheckReleasetestMachines,
                "no staging build recorded; run check_hydra_staging",
            ));
        };
        let namespace = branch.machine_namespace(Environment::Staging);

        if let Err(e) = self.services.fleet.refresh_inventory().await {
            log::warn!("Inventory refresh failed: {e}");
            self.services
                .reporter
                .on_warning(&format!("Could not refresh the release inventory: {e}"));
        }
        verify_machines_current(
            self.services.fleet,
            self.services.reporter,
            &namespace,
            build.system_name(),
            self.config.remediation_attempts,
        )
        .await?;
        Ok(())
    }

    async fn collect_changelog(&mut self) -> Result<()> {
        let vcs = self.services.vcs;
        let staging = self.branch()?.staging_branch();
        vcs.checkout(&staging, false, false).await?;

        let fragment_dir = vcs.workdir().join(FRAGMENT_DIR);
        if !fragment_dir.is_dir() {
            self.services.reporter.on_warning(&format!(
                "Could not find '{}'. Skipping changelog collection...",
                fragment_dir.display()
            ));
            return Ok(());
        }

        let changelog_path = fragment_dir.join(CHANGELOG_FILE);
        let fragments = fragment_files(&fragment_dir, &changelog_path);
        if fragments.is_empty() {
            if vcs.has_changes(&fragment_dir).await? {
                self.services
                    .reporter
                    .on_message("Committing the changelog collected by an earlier run.");
                return vcs
                    .stage_and_commit(&[fragment_dir], "Collect changelog fragments")
                    .await;
            }
            self.services
                .reporter
                .on_warning("No changelog fragments found. Nothing to collect.");
            return Ok(());
        }

        let mut collected = ChangelogTree::new();
        for path in &fragments {
            collected.union_with(&ChangelogTree::parse(&std::fs::read_to_string(path)?));
        }

        let mut accumulated = ChangelogTree::parse(&self.branch()?.changelog);
        accumulated.section(DETAILED_CHANGES).set_entries(Vec::new());
        accumulated.union_with(&collected);
        self.branch_mut()?.changelog = accumulated.render();
        // the fragments are deleted below; keep their content even if the commit fails
        self.persist()?;

        collected.strip();
        collected.add_header(format!("Release {}", self.release.id));
        let mut new_changelog = collected.render();
        if changelog_path.exists() {
            new_changelog.push('\n');
            new_changelog.push_str(&std::fs::read_to_string(&changelog_path)?);
        }
        std::fs::write(&changelog_path, new_changelog)?;
        for path in &fragments {
            std::fs::remove_file(path)?;
        }

        let mut paths = fragments;
        paths.push(changelog_path);
        if let Err(e) = vcs.stage_and_commit(&paths, "Collect changelog fragments").await {
            log::error!("Failed to commit the changelog: {e}");
            self.services.reporter.on_warning(&format!(
                "The collected changelog in '{}' is not committed. Run the branch workflow again to commit it.",
                fragment_dir.display()
            ));
            return Err(e);
        }
        Ok(())
    }

    async fn merge(&mut self) -> Result<()> {
        let branch = self.branch()?;
        let (staging, production) = (branch.staging_branch(), branch.production_branch());

        if let Some(previous) = &branch.new_production_commit {
            confirm_or_abort(
                self.services.approval,
                &format!(
                    "{production} was already merged in this cycle ({previous}). \
                     Merging again can duplicate the changelog. Merge anyway?"
                ),
            )?;
        }

        let message = format!("Merge branch '{staging}' into '{production}' for release {}", self.release.id);
        self.services.vcs.merge(&production, &staging, &message).await?;
        let commit = self.services.vcs.rev_parse(&production).await?;
        self.say(&format!("New production commit: {commit}"));
        self.branch_mut()?.new_production_commit = Some(commit);
        Ok(())
    }

    async fn backmerge(&mut self) -> Result<()> {
        let branch = self.branch()?;
        let (dev, production) = (branch.dev_branch(), branch.production_branch());
        let message = format!("Backmerge branch '{production}' into '{dev}' for release {}", self.release.id);
        self.services.vcs.merge(&dev, &production, &message).await
    }

    async fn add_detailed_changelog(&mut self) -> Result<()> {
        let vcs = self.services.vcs;
        let production = self.branch()?.production_branch();
        let old_rev = vcs.rev_parse(&format!("origin/{production}")).await?;
        let new_rev = vcs.rev_parse(&production).await?;

        let links = CompareLinks {
            platform: &self.config.compare_url,
            upstream: &self.config.upstream_compare_url,
        };
        let details = detailed_changes(vcs, self.services.reporter, &old_rev, &new_rev, &links).await?;

        let changelog = ChangelogTree::parse(&self.branch()?.changelog).union(&details);
        let changelog = review_changelog(
            self.services.approval,
            self.services.reporter,
            changelog,
            "Do you want to edit the fragment or continue?",
        )?;
        self.branch_mut()?.changelog = changelog.render();
        Ok(())
    }

    async fn push(&mut self) -> Result<()> {
        let vcs = self.services.vcs;
        let branch = self.branch()?;
        let targets = [
            PushTarget {
                branch: branch.dev_branch(),
                can_rebase: true,
            },
            PushTarget {
                branch: branch.staging_branch(),
                can_rebase: true,
            },
            PushTarget {
                branch: branch.production_branch(),
                can_rebase: false,
            },
        ];

        let remote = vcs.push_url("origin").await?;
        self.say(&format!("Pushing changes to {remote} ..."));
        push_all(vcs, self.services.reporter, &targets).await
    }

    async fn check_hydra_production(&mut self) -> Result<()> {
        let branch = self.branch()?;
        let production = branch.production_branch();
        let Some(commit) = branch.new_production_commit.clone() else {
            return Err(Self::precondition(BranchStep::CheckHydraProduction, "no production commit recorded; run merge"));
        };

        let build = wait_for_successful_build(
            self.services.builds,
            self.services.reporter,
            &production,
            &commit,
            &self.config.build_job,
            self.config.poll,
        )
        .await?;
        self.say(&format!("Detected green build {} ({})", build.eval_id, build.artifact_name));
        let branch = self.branch_mut()?;
        branch.hydra_eval_id = Some(build.eval_id.clone());
        branch.production_build = Some(build);
        Ok(())
    }

    async fn create_directory_release(&mut self) -> Result<()> {
        let branch = self.branch()?;
        let Some(eval_id) = branch.hydra_eval_id.clone() else {
            return Err(Self::precondition(
                BranchStep::CreateDirectoryRelease,
                "no production evaluation recorded; run check_hydra_production",
            ));
        };
        let Some(date) = self.release.date else {
            return Err(Self::precondition(BranchStep::CreateDirectoryRelease, "release has no date"));
        };
        let valid_from = self.config.activation_time(date)?;

        self.say(&format!(
            "Create directory release for {}\n\n  Release name: {}\n    Hydra eval: {eval_id}\n    Valid from: {}",
            branch.production_branch(),
            self.release.id,
            valid_from.format("%d.%m.%Y %H:%M %Z")
        ));
        require_confirmation(self.services.approval, "Did you add the release?")
    }

    async fn verify_production_machines(&mut self) -> Result<()> {
        let branch = self.branch()?;
        let Some(build) = branch.production_build.clone() else {
            return Err(Self::precondition(
                BranchStep::VerifyProductionMachines,
                "no production build recorded; run check_hydra_production",
            ));
        };
        let namespace = branch.machine_namespace(Environment::Production);

        verify_machines_current(
            self.services.fleet,
            self.services.reporter,
            &namespace,
            build.system_name(),
            self.config.remediation_attempts,
        )
        .await?;
        self.say(
            "Check the maintenance log and the switch output for unexpected service restarts. \
             Compare with the changelog: is the impact documented properly? You can edit the changelog in the next step.",
        );
        require_confirmation(self.services.approval, "Ready to continue?")
    }

    async fn update_changelog_with_urls(&mut self) -> Result<()> {
        let branch = self.branch()?;
        let url = metadata_url(
            &self.config.metadata_url,
            &branch.version,
            &branch.production_branch(),
            &self.release.id,
        );

        let mut changelog = ChangelogTree::parse(&branch.changelog);
        changelog.section(DETAILED_CHANGES).push_entry(format!("- [metadata]({url})"));
        match self.services.metadata.channel_url(&url).await {
            Ok(channel) => {
                changelog
                    .section(DETAILED_CHANGES)
                    .push_entry(format!("- [channel url]({channel})"));
                log::info!("Added channel url {channel}");
            }
            Err(e) => {
                log::warn!("Channel url lookup failed: {e}");
                self.services
                    .reporter
                    .on_warning("Failed to retrieve channel url. Please add it manually in the next step");
            }
        }

        let changelog = edit_changelog(self.services.approval, &changelog)?;
        let changelog = review_changelog(
            self.services.approval,
            self.services.reporter,
            changelog,
            "Do you want to edit the changelog or continue?",
        )?;
        self.branch_mut()?.changelog = changelog.render();
        Ok(())
    }
}

/// Markdown fragments below `dir` except the accumulated changelog, in path order
fn fragment_files(dir: &Path, changelog: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md") && path.as_path() != changelog)
        .collect();
    files.sort();
    files
}

impl<V, B, F, M> Workflow for BranchWorkflow<'_, V, B, F, M>
where
    V: VersionControl,
    B: BuildSystem,
    F: MachineFleet,
    M: ReleaseMetadata,
{
    type Step = BranchStep;

    fn title(&self) -> String {
        format!("Perform release actions for {}", self.version)
    }

    fn steps(&self) -> &'static [StepDef<BranchStep>] {
        BRANCH_STEPS
    }

    fn is_done(&self, step: BranchStep) -> bool {
        self.branch().is_ok_and(|b| b.has_completed(step.as_str()))
    }

    fn describe(&self, def: &StepDef<BranchStep>) -> String {
        let Ok(branch) = self.branch() else {
            return def.description.to_string();
        };
        expand_template(
            def.description,
            &[
                ("version", branch.version.as_str()),
                ("dev", branch.dev_branch().as_str()),
                ("staging", branch.staging_branch().as_str()),
                ("production", branch.production_branch().as_str()),
                ("release", self.release.id.as_str()),
            ],
        )
    }

    async fn execute(&mut self, step: BranchStep) -> Result<()> {
        match step {
            BranchStep::Prepare => self.prepare().await,
            BranchStep::ReviewPendingCommits => self.review_pending_commits().await,
            BranchStep::CheckHydraStaging => self.check_hydra_staging().await,
            BranchStep::CheckReleasetestMachines => self.check_releasetest_machines().await,
            BranchStep::CollectChangelog => self.collect_changelog().await,
            BranchStep::Merge => self.merge().await,
            BranchStep::Backmerge => self.backmerge().await,
            BranchStep::AddDetailedChangelog => self.add_detailed_changelog().await,
            BranchStep::Push => self.push().await,
            BranchStep::CheckHydraProduction => self.check_hydra_production().await,
            BranchStep::CreateDirectoryRelease => self.create_directory_release().await,
            BranchStep::VerifyProductionMachines => self.verify_production_machines().await,
            BranchStep::UpdateChangelogWithUrls => self.update_changelog_with_urls().await,
            BranchStep::MarkAsTested => self.branch_mut()?.mark_tested(),
        }
    }

    fn complete(&mut self, step: BranchStep) -> Result<()> {
        self.branch_mut()?.steps.insert(step.as_str().to_string());
        self.persist()
    }
}
