//! Release and branch entities persisted between invocations.

use crate::error::{Result, WorkflowError};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Current version of the state format
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Branch prefix used when a stored branch does not carry one
pub const DEFAULT_BRANCH_PREFIX: &str = "fc";

fn current_format_version() -> u32 {
    STATE_FORMAT_VERSION
}

fn default_prefix() -> String {
    DEFAULT_BRANCH_PREFIX.to_string()
}

/// Lifecycle stage of a release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Branches are being promoted
    InProgress,
    /// No promotion is running; a new release may be started
    #[default]
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::InProgress => write!(f, "in-progress"),
            Stage::Done => write!(f, "done"),
        }
    }
}

/// One scheduled promotion cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Version of the state format
    #[serde(default = "current_format_version")]
    pub format_version: u32,
    /// Release identifier (`YYYY_NNN`)
    #[serde(default)]
    pub id: String,
    /// Target date
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Lifecycle stage
    #[serde(default)]
    pub stage: Stage,
    /// Branches keyed by platform version name
    #[serde(default)]
    pub branches: BTreeMap<String, Branch>,
    /// Completed release-level steps
    #[serde(default)]
    pub steps: BTreeSet<String>,
}

impl Default for Release {
    fn default() -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            id: String::new(),
            date: None,
            stage: Stage::Done,
            branches: BTreeMap::new(),
            steps: BTreeSet::new(),
        }
    }
}

impl Release {
    /// Start a fresh release cycle, superseding whatever was stored before
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date: Some(date),
            stage: Stage::InProgress,
            ..Self::default()
        }
    }

    /// Whether branches of this release are still being promoted
    pub fn is_in_progress(&self) -> bool {
        self.stage == Stage::InProgress
    }

    /// Year part of the identifier
    pub fn year(&self) -> Option<&str> {
        self.id.split_once('_').map(|(year, _)| year)
    }

    /// Sequence number part of the identifier
    pub fn number(&self) -> Option<&str> {
        self.id.split_once('_').map(|(_, num)| num)
    }

    /// Look up a branch that is part of this release
    pub fn branch(&self, version: &str) -> Result<&Branch> {
        self.branches
            .get(version)
            .ok_or_else(|| unknown_branch(version))
    }

    /// Look up a branch that is part of this release, mutably
    pub fn branch_mut(&mut self, version: &str) -> Result<&mut Branch> {
        self.branches
            .get_mut(version)
            .ok_or_else(|| unknown_branch(version))
    }

    /// Branches that take part in aggregation, in version order
    pub fn active_branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values().filter(|b| !b.ignored)
    }

    /// Suggest the identifier of the release following this one on `date`
    pub fn next_id_suggestion(&self, date: NaiveDate) -> String {
        let year = date.year().to_string();
        let next = match (self.year(), self.number()) {
            (Some(prev_year), Some(num)) if prev_year == year => {
                num.parse::<u32>().map(|n| n + 1).unwrap_or(1)
            }
            _ => 1,
        };
        format!("{year}_{next:03}")
    }
}

fn unknown_branch(version: &str) -> crate::error::ReleaseError {
    WorkflowError::UnknownBranch {
        version: version.to_string(),
    }
    .into()
}

/// Whether `id` has the `YYYY_NNN` shape
pub fn is_valid_release_id(id: &str) -> bool {
    let Some((year, num)) = id.split_once('_') else {
        return false;
    };
    year.len() == 4
        && num.len() == 3
        && year.chars().all(|c| c.is_ascii_digit())
        && num.chars().all(|c| c.is_ascii_digit())
}

/// The Monday following `today`
pub fn next_monday(today: NaiveDate) -> NaiveDate {
    let days = 7 - today.weekday().num_days_from_monday() as i64;
    today + Duration::days(days)
}

/// Evaluation and artifact produced by the build system for one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    /// Evaluation identifier
    pub eval_id: String,
    /// Artifact name, e.g. `release-24.11.2025abcd`
    pub artifact_name: String,
}

impl BuildDescriptor {
    /// System name machines report once they run this artifact
    pub fn system_name(&self) -> &str {
        self.artifact_name
            .strip_prefix("release-")
            .unwrap_or(&self.artifact_name)
    }
}

/// Test environment a machine namespace belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Staging test machines
    Staging,
    /// Production test machines
    Production,
}

/// Per platform version promotion record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Platform version name, e.g. `24.11`
    pub version: String,
    /// Prefix of the VCS branch names
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Staging tip when the cycle began; written once
    #[serde(default)]
    pub orig_staging_commit: Option<String>,
    /// Production commit created by the merge step
    #[serde(default)]
    pub new_production_commit: Option<String>,
    /// Build of the original staging commit
    #[serde(default)]
    pub staging_build: Option<BuildDescriptor>,
    /// Build of the new production commit
    #[serde(default)]
    pub production_build: Option<BuildDescriptor>,
    /// Production evaluation id handed to the inventory
    #[serde(default)]
    pub hydra_eval_id: Option<String>,
    /// Accumulated changelog in markdown
    #[serde(default)]
    pub changelog: String,
    /// Promotion finished for this release
    #[serde(default)]
    pub tested: bool,
    /// Excluded from release-level aggregation
    #[serde(default)]
    pub ignored: bool,
    /// Completed step identifiers
    #[serde(default)]
    pub steps: BTreeSet<String>,
}

impl Branch {
    /// Create an untouched branch record
    pub fn new(version: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            prefix: prefix.into(),
            orig_staging_commit: None,
            new_production_commit: None,
            staging_build: None,
            production_build: None,
            hydra_eval_id: None,
            changelog: String::new(),
            tested: false,
            ignored: false,
            steps: BTreeSet::new(),
        }
    }

    /// Development branch name
    pub fn dev_branch(&self) -> String {
        format!("{}-{}-dev", self.prefix, self.version)
    }

    /// Staging branch name
    pub fn staging_branch(&self) -> String {
        format!("{}-{}-staging", self.prefix, self.version)
    }

    /// Production branch name
    pub fn production_branch(&self) -> String {
        format!("{}-{}-production", self.prefix, self.version)
    }

    /// Host name prefix of the release test machines for `env`
    pub fn machine_namespace(&self, env: Environment) -> String {
        let compact: String = self.version.chars().filter(|c| *c != '.').collect();
        match env {
            Environment::Staging => format!("release{compact}stag"),
            Environment::Production => format!("release{compact}prod"),
        }
    }

    /// Whether `step` has completed
    pub fn has_completed(&self, step: &str) -> bool {
        self.steps.contains(step)
    }

    /// Capture the staging tip unless it was captured earlier in this cycle
    pub fn capture_orig_staging(&mut self, commit: &str) -> bool {
        if self.orig_staging_commit.is_some() {
            return false;
        }
        self.orig_staging_commit = Some(commit.to_string());
        true
    }

    /// Mark promotion as finished; requires the production evaluation
    pub fn mark_tested(&mut self) -> Result<()> {
        if self.hydra_eval_id.as_deref().is_none_or(str::is_empty) {
            return Err(WorkflowError::Precondition {
                step: "mark_as_tested".to_string(),
                reason: format!(
                    "no production evaluation recorded for {}; run check_hydra_production first",
                    self.version
                ),
            }
            .into());
        }
        self.tested = true;
        Ok(())
    }

    /// Forget `step` and every later step in `order`, clearing what those steps produced.
    ///
    /// `orig_staging_commit` and `new_production_commit` survive: they are written once per
    /// cycle and a repeated merge is guarded by operator confirmation instead.
    pub fn reset_from(&mut self, step: &str, order: &[&str]) -> Result<Vec<String>> {
        let Some(start) = order.iter().position(|s| *s == step) else {
            return Err(WorkflowError::UnknownStep {
                step: step.to_string(),
                known: order.join(", "),
            }
            .into());
        };

        let mut removed = Vec::new();
        for id in &order[start..] {
            if self.steps.remove(*id) {
                removed.push((*id).to_string());
            }
            match *id {
                "check_hydra_staging" => self.staging_build = None,
                "check_hydra_production" => {
                    self.production_build = None;
                    self.hydra_eval_id = None;
                }
                "mark_as_tested" => self.tested = false,
                _ => {}
            }
        }
        Ok(removed)
    }
}
