//! Version control operations consumed by the promotion workflows.
//!
//! [`VersionControl`] is the seam between the workflows and the repository; [`GitCli`]
//! implements it by spawning `git` in a local clone.

mod repo;

pub use repo::GitCli;

use crate::error::{GitError, ReleaseError, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

/// Repository operations needed to promote a release branch
pub trait VersionControl {
    /// Make sure a local clone of `url` exists and is fetched
    fn ensure_mirror(&self, url: &str) -> impl Future<Output = Result<()>>;

    /// Names of all branches on `origin`, without the remote prefix
    fn list_remote_branches(&self) -> impl Future<Output = Result<Vec<String>>>;

    /// Check out `branch`; `reset` hard-resets it to its upstream tip, `clean` removes untracked files
    fn checkout(&self, branch: &str, reset: bool, clean: bool) -> impl Future<Output = Result<()>>;

    /// Resolve `rev` to a commit id
    fn rev_parse(&self, rev: &str) -> impl Future<Output = Result<String>>;

    /// Read `path` at `rev` and parse it as JSON
    fn show_json(&self, rev: &str, path: &str) -> impl Future<Output = Result<serde_json::Value>>;

    /// Check out `base` and merge `other` into it with a merge commit
    fn merge(&self, base: &str, other: &str, message: &str) -> impl Future<Output = Result<()>>;

    /// Push `branch` to `remote`; failures carry the command output for classification
    fn push(&self, remote: &str, branch: &str, dry_run: bool) -> impl Future<Output = Result<()>>;

    /// Fetch `branch` from `remote`
    fn fetch_branch(&self, remote: &str, branch: &str) -> impl Future<Output = Result<()>>;

    /// Rebase the checked out branch onto `onto`
    fn rebase(&self, onto: &str) -> impl Future<Output = Result<()>>;

    /// Commits on `head` that are not on `upstream`, one line each
    fn cherry_diff(&self, upstream: &str, head: &str) -> impl Future<Output = Result<Vec<String>>>;

    /// Whether `ancestor` is reachable from `descendant`
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> impl Future<Output = Result<bool>>;

    /// Stage `paths` (additions and deletions) and commit them on the checked out branch
    fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> impl Future<Output = Result<()>>;

    /// Whether the working tree has uncommitted changes under `path`
    fn has_changes(&self, path: &Path) -> impl Future<Output = Result<bool>>;

    /// Push URL of `remote`
    fn push_url(&self, remote: &str) -> impl Future<Output = Result<String>>;

    /// Working tree of the clone
    fn workdir(&self) -> &Path;
}

/// How a rejected push failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFailure {
    /// The remote has commits the local branch lacks
    Diverged,
    /// Anything else
    Other,
}

/// Markers git prints when the remote branch moved ahead
const DIVERGENCE_MARKERS: &[&str] = &["(non-fast-forward)", "(fetch first)"];

/// Classify the output of a failed push
pub fn classify_push_failure(output: &str) -> PushFailure {
    if DIVERGENCE_MARKERS.iter().any(|m| output.contains(m)) {
        PushFailure::Diverged
    } else {
        PushFailure::Other
    }
}

/// Classify a push error; errors without command output are never divergence
pub fn classify_push_error(err: &ReleaseError) -> PushFailure {
    match err {
        ReleaseError::Git(GitError::CommandFailed { output, .. }) => classify_push_failure(output),
        _ => PushFailure::Other,
    }
}
