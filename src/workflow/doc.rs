//! Release level workflow: aggregate the branch changelogs and close the release.

use crate::approval::ApprovalProvider;
use crate::changelog::{ChangelogTree, DETAILED_CHANGES, DOCUMENTATION, IMPACT, PLATFORM_PLACEHOLDER, platform_section};
use crate::config::PromotionConfig;
use crate::error::{Result, WorkflowError};
use crate::state::{Release, Stage, StateManager};
use crate::steps::{StepDef, StepId, StepReporter, Workflow, expand_template};
use crate::workflow::review_changelog;
use std::path::PathBuf;

/// Steps of the documentation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStep {
    /// Every active branch is tested
    VerifyTested,
    /// Write the aggregated changelog
    CollectChangelogs,
    /// Close the release
    Finish,
}

impl StepId for DocStep {
    fn as_str(&self) -> &'static str {
        match self {
            DocStep::VerifyTested => "verify_tested",
            DocStep::CollectChangelogs => "collect_changelogs",
            DocStep::Finish => "finish",
        }
    }
}

/// Step table of the documentation workflow
pub static DOC_STEPS: &[StepDef<DocStep>] = &[
    StepDef::always(DocStep::VerifyTested, "Verify all branches of {release} are marked as tested"),
    StepDef::new(DocStep::CollectChangelogs, "Collect changelogs from all branches"),
    StepDef::new(DocStep::Finish, "Finish release {release}"),
];

/// Combine the changelogs of all non-ignored branches into one release changelog
pub fn aggregate_changelog(release: &Release) -> ChangelogTree {
    let mut sections = vec![IMPACT.to_string()];
    sections.extend(release.active_branches().map(|b| platform_section(&b.version)));
    sections.push(DOCUMENTATION.to_string());
    sections.push(DETAILED_CHANGES.to_string());
    let mut changelog = ChangelogTree::with_sections(sections);

    for branch in release.active_branches() {
        let mut fragment = ChangelogTree::parse(&branch.changelog);

        let impact = fragment.section(IMPACT);
        if !impact.is_empty() {
            impact.add_header(branch.version.clone());
        }
        fragment.rename(PLATFORM_PLACEHOLDER, &platform_section(&branch.version));

        let details = fragment.section(DETAILED_CHANGES);
        if !details.entries().is_empty() {
            let joined = details
                .entries()
                .iter()
                .map(|e| e.strip_prefix("- ").unwrap_or(e))
                .collect::<Vec<_>>()
                .join(", ");
            details.set_entries(vec![format!("- NixOS {}: {joined}", branch.version)]);
        }

        changelog.union_with(&fragment);
    }

    changelog
        .section(DOCUMENTATION)
        .push_entry("<!--\nadd entries if necessary\n-->");
    changelog.move_to_end(DETAILED_CHANGES);

    let date = release.date.map(|d| d.to_string()).unwrap_or_default();
    changelog.add_header(format!("Release {} ({date})", release.id));
    changelog.prepend_entry(format!("---\nPublish Date: '{date}'\n---"));
    changelog
}

/// Workflow bound to the release itself
pub struct DocWorkflow<'a> {
    release: &'a mut Release,
    store: &'a StateManager,
    config: &'a PromotionConfig,
    approval: &'a dyn ApprovalProvider,
    reporter: &'a dyn StepReporter,
}

impl<'a> DocWorkflow<'a> {
    /// Bind the workflow to `release`
    pub fn new(
        release: &'a mut Release,
        store: &'a StateManager,
        config: &'a PromotionConfig,
        approval: &'a dyn ApprovalProvider,
        reporter: &'a dyn StepReporter,
    ) -> Self {
        Self {
            release,
            store,
            config,
            approval,
            reporter,
        }
    }

    /// File the aggregated changelog is written to
    pub fn changelog_path(&self) -> PathBuf {
        let number = self.release.number().unwrap_or("000");
        self.config.changelog_dir().join(format!("r{number}.md"))
    }

    fn verify_tested(&self) -> Result<()> {
        if !self.release.is_in_progress() {
            return Err(WorkflowError::NoActiveRelease.into());
        }
        let versions: Vec<&str> = self.release.active_branches().map(|b| b.version.as_str()).collect();
        self.reporter.on_message(&format!(
            "This will release the changelog for the following versions: {}",
            versions.join(", ")
        ));

        let untested: Vec<&str> = self
            .release
            .active_branches()
            .filter(|b| !b.tested)
            .map(|b| b.version.as_str())
            .collect();
        if !untested.is_empty() {
            return Err(WorkflowError::Precondition {
                step: DocStep::VerifyTested.as_str().to_string(),
                reason: format!("not tested: {}", untested.join(", ")),
            }
            .into());
        }
        Ok(())
    }

    fn collect_changelogs(&self) -> Result<()> {
        let changelog = review_changelog(
            self.approval,
            self.reporter,
            aggregate_changelog(self.release),
            "Do you want to edit the changelog or continue?",
        )?;

        let path = self.changelog_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, changelog.render())?;
        log::info!("Wrote {}", path.display());

        self.reporter
            .on_message(&format!("Changelog written to {}", path.display()));
        if let (Some(year), Some(number)) = (self.release.year(), self.release.number()) {
            self.reporter.on_message(&format!(
                "Once published it is available at {}",
                self.config.changelog_url_for(year, number)
            ));
        }
        Ok(())
    }
}

impl Workflow for DocWorkflow<'_> {
    type Step = DocStep;

    fn title(&self) -> String {
        format!("Finalize the documentation for release {}", self.release.id)
    }

    fn steps(&self) -> &'static [StepDef<DocStep>] {
        DOC_STEPS
    }

    fn is_done(&self, step: DocStep) -> bool {
        self.release.steps.contains(step.as_str())
    }

    fn describe(&self, def: &StepDef<DocStep>) -> String {
        expand_template(def.description, &[("release", self.release.id.as_str())])
    }

    async fn execute(&mut self, step: DocStep) -> Result<()> {
        match step {
            DocStep::VerifyTested => self.verify_tested(),
            DocStep::CollectChangelogs => self.collect_changelogs(),
            DocStep::Finish => {
                self.release.stage = Stage::Done;
                self.reporter
                    .on_message(&format!("Release {} is done", self.release.id));
                Ok(())
            }
        }
    }

    fn complete(&mut self, step: DocStep) -> Result<()> {
        self.release.steps.insert(step.as_str().to_string());
        self.store.save(self.release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Branch;
    use chrono::NaiveDate;

    fn release_with(changelogs: &[(&str, &str, bool)]) -> Release {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let mut release = Release::new("2025_004", date);
        for (version, changelog, ignored) in changelogs {
            let mut branch = Branch::new(*version, "fc");
            branch.changelog = changelog.to_string();
            branch.ignored = *ignored;
            release.branches.insert(version.to_string(), branch);
        }
        release
    }

    #[test]
    fn aggregates_sections_per_version() {
        let release = release_with(&[
            (
                "24.05",
                "# Impact\n\n- restarts nginx\n\n# NixOS XX.XX platform\n\n- fix a\n\n# Detailed Changes\n\n- [platform code](x)\n",
                false,
            ),
            (
                "24.11",
                "# NixOS XX.XX platform\n\n- fix b\n\n# Detailed Changes\n\n- [platform code](y)\n\n- [metadata](z)\n",
                false,
            ),
            ("23.11", "# NixOS XX.XX platform\n\n- hidden\n", true),
        ]);

        let tree = aggregate_changelog(&release);
        assert_eq!(tree.entries(), ["---\nPublish Date: '2025-03-10'\n---"]);
        let body = tree.get("Release 2025_004 (2025-03-10)").unwrap();
        assert_eq!(
            body.titles().collect::<Vec<_>>(),
            vec![
                "Impact",
                "NixOS 24.05 platform",
                "NixOS 24.11 platform",
                "Documentation",
                "Detailed Changes",
            ]
        );
        assert_eq!(body.get("Impact").unwrap().get("24.05").unwrap().entries(), ["- restarts nginx"]);
        assert_eq!(body.get("NixOS 24.11 platform").unwrap().entries(), ["- fix b"]);
        assert_eq!(
            body.get("Detailed Changes").unwrap().entries(),
            [
                "- NixOS 24.05: [platform code](x)",
                "- NixOS 24.11: [platform code](y), [metadata](z)",
            ]
        );
        assert!(!tree.render().contains("hidden"));
    }

    #[test]
    fn step_table() {
        assert!(!DOC_STEPS[0].skip_if_done);
        assert!(DOC_STEPS[1..].iter().all(|d| d.skip_if_done));
    }
}
