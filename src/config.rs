//! Runtime configuration.
//!
//! Defaults describe the Flying Circus platform; every value can be overridden through a
//! `RELEASE_*` environment variable and a few through command line flags.

use crate::error::{CliError, Result};
use crate::workflow::PollSettings;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for remediation attempts per machine
pub const MAX_REMEDIATION_ATTEMPTS: u32 = 5;

/// Upper bound for the machine name scan
pub const MAX_MACHINE_SCAN: u32 = 100;

/// Configuration for release promotion
#[derive(Debug, Clone)]
pub struct PromotionConfig {
    /// Directory holding the clone, the audit log and generated changelogs
    pub work_dir: PathBuf,
    /// Persisted release document
    pub state_file: PathBuf,
    /// Repository the branches are promoted in
    pub upstream_url: String,
    /// Prefix of the VCS branch names
    pub branch_prefix: String,
    /// Hydra instance
    pub hydra_url: String,
    /// Hydra project the jobsets belong to
    pub hydra_project: String,
    /// Job whose build decides success
    pub build_job: String,
    /// Build polling cadence and bound
    pub poll: PollSettings,
    /// Remediation attempts before a machine counts as not converged
    pub remediation_attempts: u32,
    /// Number of machine names probed per namespace
    pub machine_scan: u32,
    /// Host that refreshes the release inventory, if any
    pub inventory_host: Option<String>,
    /// Metadata URL template (`{version}`, `{branch}`, `{release_id}`)
    pub metadata_url: String,
    /// Platform code compare URL template (`{old}`, `{new}`)
    pub compare_url: String,
    /// Upstream package set compare URL template (`{old}`, `{new}`)
    pub upstream_compare_url: String,
    /// Published changelog URL template (`{year}`, `{number}`)
    pub changelog_url: String,
    /// Local time of day a release becomes valid
    pub release_time: NaiveTime,
    /// Time zone of `release_time`
    pub time_zone: Tz,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("work"),
            state_file: PathBuf::from("state.json"),
            upstream_url: "git@github.com:flyingcircusio/fc-nixos.git".to_string(),
            branch_prefix: "fc".to_string(),
            hydra_url: "https://hydra.flyingcircus.io".to_string(),
            hydra_project: "flyingcircus".to_string(),
            build_job: "release".to_string(),
            poll: PollSettings::default(),
            remediation_attempts: 1,
            machine_scan: MAX_MACHINE_SCAN,
            inventory_host: None,
            metadata_url: "https://my.flyingcircus.io/releases/metadata/{branch}/{release_id}".to_string(),
            compare_url: "https://github.com/flyingcircusio/fc-nixos/compare/{old}...{new}".to_string(),
            upstream_compare_url: "https://github.com/flyingcircusio/nixpkgs/compare/{old}...{new}".to_string(),
            changelog_url: "https://doc.flyingcircus.io/platform/changes/{year}/r{number}.html".to_string(),
            release_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or_default(),
            time_zone: chrono_tz::Europe::Berlin,
        }
    }
}

impl PromotionConfig {
    /// Defaults overridden by `RELEASE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `RELEASE_*` key
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = text("RELEASE_WORK_DIR") {
            config.work_dir = PathBuf::from(v);
        }
        if let Some(v) = text("RELEASE_STATE_FILE") {
            config.state_file = PathBuf::from(v);
        }
        if let Some(v) = text("RELEASE_UPSTREAM_URL") {
            config.upstream_url = v;
        }
        if let Some(v) = text("RELEASE_BRANCH_PREFIX") {
            config.branch_prefix = v;
        }
        if let Some(v) = text("RELEASE_HYDRA_URL") {
            config.hydra_url = v;
        }
        if let Some(v) = text("RELEASE_HYDRA_PROJECT") {
            config.hydra_project = v;
        }
        if let Some(v) = text("RELEASE_BUILD_JOB") {
            config.build_job = v;
        }
        if let Some(v) = text("RELEASE_POLL_INTERVAL_SECS") {
            config.poll.interval = Duration::from_secs(parse_number("RELEASE_POLL_INTERVAL_SECS", &v)?.max(1));
        }
        if let Some(v) = text("RELEASE_BUILD_TIMEOUT_SECS") {
            let secs = parse_number("RELEASE_BUILD_TIMEOUT_SECS", &v)?;
            config.poll.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config.remediation_attempts = parse_clamped(
            text("RELEASE_REMEDIATION_ATTEMPTS"),
            config.remediation_attempts,
            MAX_REMEDIATION_ATTEMPTS,
        );
        config.machine_scan = parse_clamped(text("RELEASE_MACHINE_SCAN"), config.machine_scan, MAX_MACHINE_SCAN);
        if let Some(v) = text("RELEASE_INVENTORY_HOST") {
            config.inventory_host = Some(v);
        }
        if let Some(v) = text("RELEASE_METADATA_URL") {
            config.metadata_url = v;
        }
        if let Some(v) = text("RELEASE_COMPARE_URL") {
            config.compare_url = v;
        }
        if let Some(v) = text("RELEASE_UPSTREAM_COMPARE_URL") {
            config.upstream_compare_url = v;
        }
        if let Some(v) = text("RELEASE_CHANGELOG_URL") {
            config.changelog_url = v;
        }
        if let Some(v) = text("RELEASE_TIME") {
            config.release_time = NaiveTime::parse_from_str(v.trim(), "%H:%M").map_err(|e| invalid("RELEASE_TIME", &v, e))?;
        }
        if let Some(v) = text("RELEASE_TIME_ZONE") {
            config.time_zone = v.trim().parse::<Tz>().map_err(|e| invalid("RELEASE_TIME_ZONE", &v, e))?;
        }

        Ok(config)
    }

    /// Local clone of the upstream repository
    pub fn repo_dir(&self) -> PathBuf {
        self.work_dir.join("fc-nixos")
    }

    /// Audit log of every git command
    pub fn commands_log(&self) -> PathBuf {
        self.work_dir.join("commands.log")
    }

    /// Directory for aggregated release changelogs
    pub fn changelog_dir(&self) -> PathBuf {
        self.work_dir.join("changelog")
    }

    /// Instant a release dated `date` becomes valid, in UTC
    pub fn activation_time(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        let local = date.and_time(self.release_time);
        self.time_zone
            .from_local_datetime(&local)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| {
                CliError::InvalidArguments {
                    reason: format!("{local} does not exist in {}", self.time_zone),
                }
                .into()
            })
    }

    /// Published changelog URL for a release id
    pub fn changelog_url_for(&self, year: &str, number: &str) -> String {
        crate::steps::expand_template(&self.changelog_url, &[("year", year), ("number", number)])
    }
}

/// Parse a count and clamp it to `max`; unparsable values fall back to `default`
fn parse_clamped(value: Option<String>, default: u32, max: u32) -> u32 {
    value
        .and_then(|s| s.trim().parse::<u32>().ok())
        .map(|v| v.min(max))
        .unwrap_or(default)
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|e| invalid(key, value, e))
}

fn invalid(key: &str, value: &str, err: impl std::fmt::Display) -> crate::error::ReleaseError {
    CliError::InvalidArguments {
        reason: format!("{key}={value}: {err}"),
    }
    .into()
}
