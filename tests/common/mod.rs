//! Recording collaborators for workflow integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use release_promoter::approval::ApprovalProvider;
use release_promoter::config::PromotionConfig;
use release_promoter::error::{GitError, ReleaseError, Result};
use release_promoter::fleet::MachineFleet;
use release_promoter::git::VersionControl;
use release_promoter::hydra::{BuildStatus, BuildSystem};
use release_promoter::metadata::ReleaseMetadata;
use release_promoter::state::{Branch, Release};
use release_promoter::steps::StepReporter;
use release_promoter::workflow::{PollSettings, Services};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const RELEASE_ID: &str = "2025_004";
pub const VERSION: &str = "24.11";
pub const STAGING_COMMIT: &str = "aaa111";
pub const PRODUCTION_COMMIT: &str = "bbb222";
pub const EVAL_ID: &str = "e1";
pub const ARTIFACT: &str = "release-24.11.2025abcd";
pub const SYSTEM: &str = "24.11.2025abcd";
pub const CHANNEL_URL: &str = "https://hydra.example/channel/custom/flyingcircus/fc-24.11-production/release";

pub fn release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

/// Fresh release with one branch for [`VERSION`]
pub fn seeded_release() -> Release {
    let mut release = Release::new(RELEASE_ID, release_date());
    release
        .branches
        .insert(VERSION.to_string(), Branch::new(VERSION, "fc"));
    release
}

/// Configuration rooted in `dir` with fast polling
pub fn test_config(dir: &Path) -> PromotionConfig {
    PromotionConfig {
        work_dir: dir.join("work"),
        state_file: dir.join("state.json"),
        poll: PollSettings {
            interval: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(5)),
        },
        ..PromotionConfig::default()
    }
}

fn command_failed(command: &str, output: &str) -> ReleaseError {
    GitError::CommandFailed {
        command: command.to_string(),
        code: Some(1),
        output: output.to_string(),
    }
    .into()
}

/// In-memory repository recording every call
pub struct MockVcs {
    workdir: PathBuf,
    pub calls: Mutex<Vec<String>>,
    revs: Mutex<HashMap<String, String>>,
    remote_branches: Vec<String>,
    ancestors: HashSet<(String, String)>,
    json: HashMap<(String, String), serde_json::Value>,
    dry_run_rejections: Mutex<HashMap<String, VecDeque<String>>>,
    failing: Mutex<HashSet<String>>,
    uncommitted: Mutex<Vec<PathBuf>>,
}

impl MockVcs {
    pub fn new(workdir: &Path) -> Self {
        let mut revs = HashMap::new();
        revs.insert(format!("fc-{VERSION}-staging"), STAGING_COMMIT.to_string());
        revs.insert(format!("fc-{VERSION}-production"), PRODUCTION_COMMIT.to_string());
        Self {
            workdir: workdir.to_path_buf(),
            calls: Mutex::new(Vec::new()),
            revs: Mutex::new(revs),
            remote_branches: Vec::new(),
            ancestors: HashSet::new(),
            json: HashMap::new(),
            dry_run_rejections: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            uncommitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_remote_branches(mut self, branches: &[&str]) -> Self {
        self.remote_branches = branches.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn with_ancestor(mut self, ancestor: &str, descendant: &str) -> Self {
        self.ancestors.insert((ancestor.to_string(), descendant.to_string()));
        self
    }

    pub fn with_json(mut self, rev: &str, path: &str, value: serde_json::Value) -> Self {
        self.json.insert((rev.to_string(), path.to_string()), value);
        self
    }

    pub fn set_rev(&self, rev: &str, commit: &str) {
        self.revs.lock().unwrap().insert(rev.to_string(), commit.to_string());
    }

    /// Reject the next dry-run push of `branch` with `output`
    pub fn reject_dry_run(&self, branch: &str, output: &str) {
        self.dry_run_rejections
            .lock()
            .unwrap()
            .entry(branch.to_string())
            .or_default()
            .push_back(output.to_string());
    }

    /// Fail the next call of `operation`
    pub fn fail_once(&self, operation: &str) {
        self.failing.lock().unwrap().insert(operation.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, operation: &str, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        if self.failing.lock().unwrap().remove(operation) {
            return Err(command_failed(&call, "injected failure"));
        }
        Ok(())
    }
}

impl VersionControl for MockVcs {
    async fn ensure_mirror(&self, url: &str) -> Result<()> {
        self.record("ensure_mirror", format!("ensure_mirror {url}"))
    }

    async fn list_remote_branches(&self) -> Result<Vec<String>> {
        self.record("list_remote_branches", "list_remote_branches".to_string())?;
        Ok(self.remote_branches.clone())
    }

    async fn checkout(&self, branch: &str, reset: bool, clean: bool) -> Result<()> {
        self.record("checkout", format!("checkout {branch} reset={reset} clean={clean}"))
    }

    async fn rev_parse(&self, rev: &str) -> Result<String> {
        self.record("rev_parse", format!("rev_parse {rev}"))?;
        Ok(self
            .revs
            .lock()
            .unwrap()
            .get(rev)
            .cloned()
            .unwrap_or_else(|| format!("rev-of-{rev}")))
    }

    async fn show_json(&self, rev: &str, path: &str) -> Result<serde_json::Value> {
        self.record("show_json", format!("show_json {rev} {path}"))?;
        self.json
            .get(&(rev.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| {
                GitError::ShowFailed {
                    rev: rev.to_string(),
                    path: path.to_string(),
                    reason: "does not exist".to_string(),
                }
                .into()
            })
    }

    async fn merge(&self, base: &str, other: &str, message: &str) -> Result<()> {
        self.record("merge", format!("merge {other} into {base}: {message}"))
    }

    async fn push(&self, remote: &str, branch: &str, dry_run: bool) -> Result<()> {
        let call = format!("push {remote} {branch}{}", if dry_run { " --dry-run" } else { "" });
        self.record("push", call.clone())?;
        if dry_run {
            let rejection = self
                .dry_run_rejections
                .lock()
                .unwrap()
                .get_mut(branch)
                .and_then(VecDeque::pop_front);
            if let Some(output) = rejection {
                return Err(command_failed(&call, &output));
            }
        }
        Ok(())
    }

    async fn fetch_branch(&self, remote: &str, branch: &str) -> Result<()> {
        self.record("fetch_branch", format!("fetch {remote} {branch}"))
    }

    async fn rebase(&self, onto: &str) -> Result<()> {
        self.record("rebase", format!("rebase {onto}"))
    }

    async fn cherry_diff(&self, upstream: &str, head: &str) -> Result<Vec<String>> {
        self.record("cherry_diff", format!("cherry {upstream} {head}"))?;
        Ok(vec!["+ 1234abcd Fix nginx reload".to_string()])
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        self.record("is_ancestor", format!("is_ancestor {ancestor} {descendant}"))?;
        Ok(self
            .ancestors
            .contains(&(ancestor.to_string(), descendant.to_string())))
    }

    async fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        let mut uncommitted = self.uncommitted.lock().unwrap();
        let result = self.record("stage_and_commit", format!("commit {} path(s): {message}", paths.len()));
        if result.is_err() {
            uncommitted.extend(paths.iter().cloned());
        } else {
            uncommitted.retain(|p| !paths.iter().any(|staged| p.starts_with(staged)));
        }
        result
    }

    async fn has_changes(&self, path: &Path) -> Result<bool> {
        self.record("has_changes", format!("has_changes {}", path.display()))?;
        Ok(self.uncommitted.lock().unwrap().iter().any(|p| p.starts_with(path)))
    }

    async fn push_url(&self, remote: &str) -> Result<String> {
        self.record("push_url", format!("push_url {remote}"))?;
        Ok("git@github.com:example/fc-nixos.git".to_string())
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }
}

/// Build system that knows one successful evaluation for every commit
pub struct MockBuilds {
    pub lookups: Mutex<Vec<(String, String)>>,
    status: BuildStatus,
}

impl MockBuilds {
    pub fn succeeding() -> Self {
        Self::with_status(true)
    }

    pub fn failing() -> Self {
        Self::with_status(false)
    }

    fn with_status(succeeded: bool) -> Self {
        Self {
            lookups: Mutex::new(Vec::new()),
            status: BuildStatus {
                finished: true,
                succeeded,
                artifact_name: ARTIFACT.to_string(),
            },
        }
    }
}

impl BuildSystem for MockBuilds {
    async fn find_evaluation(&self, branch: &str, commit: &str) -> Result<Option<String>> {
        self.lookups
            .lock()
            .unwrap()
            .push((branch.to_string(), commit.to_string()));
        Ok(Some(EVAL_ID.to_string()))
    }

    async fn get_build(&self, _eval_id: &str, _job: &str) -> Result<BuildStatus> {
        Ok(self.status.clone())
    }

    fn evaluations_url(&self, branch: &str) -> String {
        format!("https://hydra.example/jobset/flyingcircus/{branch}/evals")
    }

    fn build_url(&self, eval_id: &str, job: &str) -> String {
        format!("https://hydra.example/eval/{eval_id}/job/{job}")
    }
}

/// One machine per namespace, running [`SYSTEM`] unless told otherwise
pub struct MockFleet {
    running: Mutex<String>,
    pub namespaces: Mutex<Vec<String>>,
    pub refreshes: Mutex<u32>,
}

impl MockFleet {
    pub fn current() -> Self {
        Self::running(SYSTEM)
    }

    pub fn running(system: &str) -> Self {
        Self {
            running: Mutex::new(system.to_string()),
            namespaces: Mutex::new(Vec::new()),
            refreshes: Mutex::new(0),
        }
    }
}

impl MachineFleet for MockFleet {
    async fn refresh_inventory(&self) -> Result<()> {
        *self.refreshes.lock().unwrap() += 1;
        Ok(())
    }

    async fn discover(&self, namespace: &str) -> Result<Vec<String>> {
        self.namespaces.lock().unwrap().push(namespace.to_string());
        Ok(vec![format!("{namespace}00")])
    }

    async fn system_name(&self, _machine: &str) -> Result<String> {
        Ok(self.running.lock().unwrap().clone())
    }

    async fn remediate(&self, _machine: &str) -> Result<()> {
        Ok(())
    }
}

/// Metadata endpoint answering with a fixed channel URL, or failing
pub struct MockMetadata(pub Option<String>);

impl ReleaseMetadata for MockMetadata {
    async fn channel_url(&self, metadata_url: &str) -> Result<String> {
        self.0.clone().ok_or_else(|| {
            std::io::Error::other(format!("{metadata_url} unreachable")).into()
        })
    }
}

/// Answers prompts from a script: confirmations default to yes, choices to "continue"
#[derive(Default)]
pub struct ScriptedApproval {
    confirms: Mutex<VecDeque<bool>>,
    inputs: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub edits: Mutex<u32>,
}

impl ScriptedApproval {
    pub fn answering(confirms: &[bool]) -> Self {
        let approval = Self::default();
        approval.confirms.lock().unwrap().extend(confirms);
        approval
    }

    pub fn with_inputs(self, inputs: &[&str]) -> Self {
        self.inputs
            .lock()
            .unwrap()
            .extend(inputs.iter().map(|s| s.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ApprovalProvider for ScriptedApproval {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.confirms.lock().unwrap().pop_front().unwrap_or(true))
    }

    fn choose(&self, prompt: &str, options: &[&str]) -> Result<usize> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(options.iter().position(|o| *o == "continue").unwrap_or(0))
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self
            .inputs
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| default.map(str::to_string))
            .unwrap_or_default())
    }

    fn edit(&self, text: &str) -> Result<String> {
        *self.edits.lock().unwrap() += 1;
        Ok(text.to_string())
    }
}

/// Reporter keeping messages and warnings for assertions
#[derive(Default)]
pub struct RecordingReporter {
    pub messages: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    pub failed: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn mentions(&self, needle: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|m| m.contains(needle))
    }

    pub fn warned(&self, needle: &str) -> bool {
        self.warnings.lock().unwrap().iter().any(|m| m.contains(needle))
    }
}

impl StepReporter for RecordingReporter {
    fn on_workflow(&self, _title: &str) {}
    fn on_step_started(&self, _index: usize, _total: usize, _id: &str, _description: &str) {}
    fn on_step_skipped(&self, _id: &str) {}
    fn on_step_completed(&self, _id: &str) {}

    fn on_step_failed(&self, id: &str, _error: &ReleaseError) {
        self.failed.lock().unwrap().push(id.to_string());
    }

    fn on_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn on_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

/// Bundle of mocks a test drives a workflow with
pub struct Harness {
    pub vcs: MockVcs,
    pub builds: MockBuilds,
    pub fleet: MockFleet,
    pub metadata: MockMetadata,
    pub approval: ScriptedApproval,
    pub reporter: RecordingReporter,
}

impl Harness {
    pub fn new(workdir: &Path) -> Self {
        Self {
            vcs: MockVcs::new(workdir),
            builds: MockBuilds::succeeding(),
            fleet: MockFleet::current(),
            metadata: MockMetadata(Some(CHANNEL_URL.to_string())),
            approval: ScriptedApproval::default(),
            reporter: RecordingReporter::default(),
        }
    }

    pub fn services(&self) -> Services<'_, MockVcs, MockBuilds, MockFleet, MockMetadata> {
        Services {
            vcs: &self.vcs,
            builds: &self.builds,
            fleet: &self.fleet,
            metadata: &self.metadata,
            approval: &self.approval,
            reporter: &self.reporter,
        }
    }
}
