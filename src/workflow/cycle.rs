//! Starting a release cycle and managing its branch set.

use crate::approval::{ApprovalProvider, require_confirmation};
use crate::config::PromotionConfig;
use crate::error::{CliError, Result, WorkflowError};
use crate::git::VersionControl;
use crate::state::{Branch, Release, StateManager, is_valid_release_id, next_monday};
use crate::steps::StepReporter;
use chrono::NaiveDate;
use regex::Regex;

/// Operator supplied values for a new release; missing ones are prompted for
#[derive(Debug, Clone, Default)]
pub struct NewRelease {
    /// Identifier in `YYYY_NNN` form
    pub id: Option<String>,
    /// Release date as `YYYY-MM-DD`
    pub date: Option<String>,
}

/// Platform versions that have a production branch on the remote, sorted
pub async fn discover_versions<V: VersionControl>(vcs: &V, prefix: &str) -> Result<Vec<String>> {
    let pattern = format!(r"^{}-(\d{{2}}\.\d{{2}})-production$", regex::escape(prefix));
    let re = Regex::new(&pattern).map_err(|e| CliError::InvalidArguments {
        reason: format!("invalid branch prefix '{prefix}': {e}"),
    })?;

    let mut versions: Vec<String> = vcs
        .list_remote_branches()
        .await?
        .iter()
        .filter_map(|name| re.captures(name).map(|c| c[1].to_string()))
        .collect();
    versions.sort();
    versions.dedup();
    Ok(versions)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        CliError::InvalidArguments {
            reason: format!("'{value}' is not a date of the form YYYY-MM-DD"),
        }
        .into()
    })
}

fn validate_id(id: &str) -> Result<String> {
    let id = id.trim();
    if is_valid_release_id(id) {
        Ok(id.to_string())
    } else {
        Err(CliError::InvalidArguments {
            reason: format!("'{id}' is not a release id of the form YYYY_NNN"),
        }
        .into())
    }
}

/// Markdown checklist for the release ticket
pub fn release_checklist(release: &Release, config: &PromotionConfig) -> String {
    let mut out = String::new();
    for branch in release.active_branches() {
        out.push_str(&format!(
            "## NixOS {v}\n\n- [ ] `release branch {v}`\n\n",
            v = branch.version
        ));
    }
    let date = release.date.map(|d| d.to_string()).unwrap_or_default();
    out.push_str(&format!(
        "## Documentation and announcement\n\n\
         - [ ] `release doc`\n  - [ ] check rendered changelog\n\
         - [ ] Announce release and link to the changelog\n\n\
         ## Release ({date} {} {})\n\n\
         - [ ] verify production machines picked up the release\n",
        config.release_time.format("%H:%M"),
        config.time_zone
    ));
    out
}

/// Collaborators used while starting a release
pub struct CycleServices<'a, V> {
    /// Repository
    pub vcs: &'a V,
    /// Operator decisions
    pub approval: &'a dyn ApprovalProvider,
    /// Operator-facing output
    pub reporter: &'a dyn StepReporter,
}

/// Begin a new release cycle.
///
/// Refuses while another release is in progress. Every platform version whose staging
/// branch has commits production lacks becomes a branch of the new release.
pub async fn start_release<V: VersionControl>(
    release: &mut Release,
    store: &StateManager,
    config: &PromotionConfig,
    services: CycleServices<'_, V>,
    request: NewRelease,
    today: NaiveDate,
) -> Result<()> {
    let CycleServices { vcs, approval, reporter } = services;
    if release.is_in_progress() {
        return Err(WorkflowError::ReleaseInProgress {
            id: release.id.clone(),
        }
        .into());
    }

    let date = match request.date {
        Some(date) => parse_date(&date)?,
        None => {
            let suggestion = next_monday(today).to_string();
            parse_date(&approval.input("Release date", Some(&suggestion))?)?
        }
    };
    let id = match request.id {
        Some(id) => validate_id(&id)?,
        None => {
            let suggestion = release.next_id_suggestion(date);
            validate_id(&approval.input("Release id", Some(&suggestion))?)?
        }
    };

    let mut fresh = Release::new(id, date);
    reporter.on_message(&format!("Starting release {} for {date}", fresh.id));

    vcs.ensure_mirror(&config.upstream_url).await?;
    let versions = discover_versions(vcs, &config.branch_prefix).await?;
    log::info!("Found platform versions: {}", versions.join(", "));

    for version in versions {
        let mut branch = Branch::new(version.clone(), config.branch_prefix.clone());
        let (staging, production) = (branch.staging_branch(), branch.production_branch());
        for name in [branch.dev_branch(), staging.clone(), production.clone()] {
            vcs.checkout(&name, true, true).await?;
        }

        if vcs.is_ancestor(&staging, &production).await? {
            reporter.on_message(&format!("No changes for {version} detected"));
            continue;
        }
        let tip = vcs.rev_parse(&staging).await?;
        branch.capture_orig_staging(&tip);
        reporter.on_message(&format!("Marking {version} for release."));
        fresh.branches.insert(version, branch);
    }

    if fresh.branches.is_empty() {
        reporter.on_warning("No platform version has pending changes");
    }

    *release = fresh;
    store.save(release)?;

    reporter.on_message("Please copy the following markdown snippets to the checklist of the release ticket.");
    reporter.on_message(&release_checklist(release, config));
    require_confirmation(approval, "Have you copied the checklist to the release issue?")
}

/// Exclude `version` from the release; it no longer counts for aggregation
pub fn ignore_branch(release: &mut Release, store: &StateManager, version: &str) -> Result<()> {
    release.branch_mut(version)?.ignored = true;
    store.save(release)
}
