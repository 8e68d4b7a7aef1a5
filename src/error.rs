//! Error types for release promotion.
//!
//! Every fatal condition the operator can run into has its own variant so the CLI can print
//! an actionable message and recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release promotion operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Persisted state errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Version control errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// External build system errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Test machine fleet errors
    #[error("Fleet error: {0}")]
    Fleet(#[from] FleetError),

    /// Workflow precondition and control flow errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// State management errors
#[derive(Error, Debug)]
pub enum StateError {
    /// State file exists but does not match the schema
    #[error("State file {path} is corrupted: {reason}")]
    Corrupted {
        /// Path of the state file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// State written by a newer version of this tool
    #[error("State file version mismatch: expected at most {expected}, found {found}")]
    VersionMismatch {
        /// Highest supported version
        expected: u32,
        /// Version found in the file
        found: u32,
    },

    /// Failed to save state
    #[error("Failed to save state: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },

    /// Failed to load state
    #[error("Failed to load state: {reason}")]
    LoadFailed {
        /// Reason for the error
        reason: String,
    },
}

/// Version control errors
#[derive(Error, Debug)]
pub enum GitError {
    /// A git command exited unsuccessfully
    #[error("`{command}` failed (exit code {code:?}):\n{output}")]
    CommandFailed {
        /// Command line that was executed
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Combined stdout and stderr
        output: String,
    },

    /// The git binary could not be spawned
    #[error("Failed to run git: {reason}")]
    SpawnFailed {
        /// Reason for the error
        reason: String,
    },

    /// Remote production branch has commits that are not present locally
    #[error(
        "Remote has diverged for production branch '{branch}'. Production only advances through \
         this workflow and must never be rebased automatically:\n{output}"
    )]
    ProductionDivergence {
        /// Production branch name
        branch: String,
        /// Output of the rejected dry-run push
        output: String,
    },

    /// Push failed for a reason other than remote divergence
    #[error("Push of '{branch}' failed unexpectedly:\n{output}")]
    UnexpectedPushFailure {
        /// Branch that was pushed
        branch: String,
        /// Output of the failed push
        output: String,
    },

    /// A file could not be read from a revision or parsed
    #[error("Could not read '{path}' at {rev}: {reason}")]
    ShowFailed {
        /// Revision that was inspected
        rev: String,
        /// Repository-relative path
        path: String,
        /// Reason for the error
        reason: String,
    },
}

/// External build system errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Build finished with a non-zero status
    #[error("Build of job '{job}' for {branch}@{commit} failed (evaluation {eval_id})")]
    BuildFailed {
        /// Branch that was built
        branch: String,
        /// Commit that was built
        commit: String,
        /// Evaluation that contains the failed build
        eval_id: String,
        /// Job name
        job: String,
    },

    /// Polling exceeded the configured timeout
    #[error("Timed out after {waited_secs}s waiting for {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Seconds waited before giving up
        waited_secs: u64,
    },

    /// The build system answered with something unexpected
    #[error("Unexpected build system response from {url}: {reason}")]
    InvalidResponse {
        /// URL that was queried
        url: String,
        /// Reason for the error
        reason: String,
    },
}

/// Test machine fleet errors
#[derive(Error, Debug)]
pub enum FleetError {
    /// No machines were discovered in the namespace
    #[error("Could not find any test machines named {namespace}NN. Please check your network.")]
    NoMachines {
        /// Machine name prefix
        namespace: String,
    },

    /// A machine did not adopt the expected artifact after remediation
    #[error("{machine} did not switch to {expected} (currently {actual}) after {attempts} remediation attempt(s)")]
    NotConverged {
        /// Machine name
        machine: String,
        /// Expected system name
        expected: String,
        /// System name reported by the machine
        actual: String,
        /// Remediation attempts performed
        attempts: u32,
    },

    /// A remote command failed
    #[error("`{command}` on {machine} failed (exit code {code:?}):\n{output}")]
    RemoteCommandFailed {
        /// Machine name
        machine: String,
        /// Command that was executed
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Combined stdout and stderr
        output: String,
    },
}

/// Workflow errors
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A step was invoked before the data it depends on exists
    #[error("Precondition failed for step '{step}': {reason}")]
    Precondition {
        /// Step identifier
        step: String,
        /// Reason for the error
        reason: String,
    },

    /// The operator interrupted the run
    #[error("Interrupted by operator")]
    Interrupted,

    /// The operator declined to continue
    #[error("Aborted by operator: {reason}")]
    Aborted {
        /// What was declined
        reason: String,
    },

    /// `start` while another release is still in progress
    #[error("Release {id} is still in progress. Finish it before starting a new one.")]
    ReleaseInProgress {
        /// Identifier of the in-progress release
        id: String,
    },

    /// No release has been started yet
    #[error("No release in progress. Run `release start` first.")]
    NoActiveRelease,

    /// Branch is not part of the current release
    #[error("'{version}' was not scheduled for release or is unknown")]
    UnknownBranch {
        /// Platform version name
        version: String,
    },

    /// Step identifier given on the command line is not known
    #[error("Unknown step '{step}'. Known steps: {known}")]
    UnknownStep {
        /// Requested step
        step: String,
        /// Comma separated list of known steps
        known: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// A required tool is not installed
    #[error("Required executable '{name}' not found in PATH")]
    MissingExecutable {
        /// Executable name
        name: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::State(StateError::Corrupted { path, .. }) => vec![
                format!("Inspect {} manually; the tool will not reset it for you", path.display()),
                "Restore the file from a backup or fix the offending field".to_string(),
            ],
            ReleaseError::Git(GitError::ProductionDivergence { branch, .. }) => vec![
                format!("Someone pushed to '{branch}' outside of this workflow; investigate before continuing"),
                "Re-run the branch command once production history is understood".to_string(),
            ],
            ReleaseError::Git(GitError::CommandFailed { .. }) => vec![
                "Inspect commands.log in the work directory for the full command history".to_string(),
                "Fix the repository state by hand and re-run the same command to resume".to_string(),
            ],
            ReleaseError::Build(BuildError::BuildFailed { eval_id, .. }) => vec![
                format!("Investigate evaluation {eval_id} in the build system"),
                "Push a fixed commit and restart the branch with --reset-from prepare".to_string(),
            ],
            ReleaseError::Fleet(FleetError::NotConverged { machine, .. }) => vec![
                format!("Log into {machine} and check the maintenance log"),
                "Re-run the branch command to retry the convergence check".to_string(),
            ],
            ReleaseError::Workflow(WorkflowError::NoActiveRelease) => {
                vec!["Start a release cycle: release start".to_string()]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Whether this error represents an operator interrupt rather than a failure
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ReleaseError::Workflow(WorkflowError::Interrupted))
    }
}

impl GitError {
    /// Output captured from the failed command, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            GitError::CommandFailed { output, .. }
            | GitError::ProductionDivergence { output, .. }
            | GitError::UnexpectedPushFailure { output, .. } => Some(output),
            _ => None,
        }
    }
}
