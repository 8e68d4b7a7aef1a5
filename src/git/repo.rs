//! [`VersionControl`] backed by the `git` executable.

use crate::error::{GitError, Result};
use crate::git::VersionControl;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Captured result of one git invocation
#[derive(Debug)]
struct GitOutput {
    code: Option<i32>,
    stdout: String,
    combined: String,
}

impl GitOutput {
    fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Local clone driven through the `git` command line
#[derive(Debug, Clone)]
pub struct GitCli {
    path: PathBuf,
    audit_log: Option<PathBuf>,
}

impl GitCli {
    /// Clone at `path`; every command is appended to `audit_log` when given
    pub fn new(path: impl Into<PathBuf>, audit_log: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            audit_log,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.path);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    async fn run_raw(&self, args: &[&str]) -> Result<GitOutput> {
        let line = format!("git {}", args.join(" "));
        log::debug!("$ {line}");

        let output = self
            .command()
            .args(args)
            .output()
            .await
            .map_err(|e| GitError::SpawnFailed {
                reason: format!("{line}: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}{stderr}");
        log::trace!("{combined}");
        self.audit(&line, output.status.code(), &combined);

        Ok(GitOutput {
            code: output.status.code(),
            stdout,
            combined,
        })
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.run_raw(args).await?;
        if !output.success() {
            return Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                code: output.code,
                output: output.combined,
            }
            .into());
        }
        Ok(output.stdout)
    }

    fn audit(&self, line: &str, code: Option<i32>, output: &str) {
        let Some(log_path) = &self.audit_log else {
            return;
        };
        let entry = format!(
            "[{}] {} $ {line}\n{output}(exit code {code:?})\n\n",
            chrono::Utc::now().to_rfc3339(),
            self.path.display()
        );
        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .and_then(|mut f| f.write_all(entry.as_bytes()));
        if let Err(e) = written {
            log::warn!("Could not append to {}: {e}", log_path.display());
        }
    }

    async fn origin_urls(&self) -> Result<Vec<String>> {
        let output = self.run_raw(&["remote", "get-url", "--all", "origin"]).await?;
        if !output.success() {
            return Ok(Vec::new());
        }
        Ok(output.stdout.lines().map(|l| l.trim().to_string()).collect())
    }
}

impl VersionControl for GitCli {
    async fn ensure_mirror(&self, url: &str) -> Result<()> {
        if !self.path.join(".git").exists() {
            tokio::fs::create_dir_all(&self.path).await?;
            self.run(&["init", "-q"]).await?;
        }

        let current = self.origin_urls().await?;
        if current != [url] {
            if !current.is_empty() {
                self.run(&["remote", "remove", "origin"]).await?;
            }
            self.run(&["remote", "add", "origin", url]).await?;
        }

        self.run(&["fetch", "origin", "--tags", "--prune", "--prune-tags", "--force"])
            .await?;
        Ok(())
    }

    async fn list_remote_branches(&self) -> Result<Vec<String>> {
        let out = self
            .run(&["branch", "--remotes", "--format=%(refname:short)"])
            .await?;
        Ok(out
            .lines()
            .filter_map(|l| l.trim().strip_prefix("origin/"))
            .filter(|b| *b != "HEAD")
            .map(str::to_string)
            .collect())
    }

    async fn checkout(&self, branch: &str, reset: bool, clean: bool) -> Result<()> {
        if reset {
            self.run(&["checkout", "-q", "-f", branch]).await?;
            self.run(&["reset", "-q", "--hard", &format!("origin/{branch}")])
                .await?;
        } else {
            self.run(&["checkout", "-q", branch]).await?;
        }
        if clean {
            self.run(&["clean", "-d", "--force"]).await?;
        }
        self.run(&["branch", &format!("--set-upstream-to=origin/{branch}")])
            .await?;
        Ok(())
    }

    async fn rev_parse(&self, rev: &str) -> Result<String> {
        Ok(self.run(&["rev-parse", "--verify", rev]).await?.trim().to_string())
    }

    async fn show_json(&self, rev: &str, path: &str) -> Result<serde_json::Value> {
        let content = self.run(&["show", &format!("{rev}:{path}")]).await?;
        serde_json::from_str(&content).map_err(|e| {
            GitError::ShowFailed {
                rev: rev.to_string(),
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn merge(&self, base: &str, other: &str, message: &str) -> Result<()> {
        self.run(&["checkout", "-q", base]).await?;
        self.run(&["merge", "--no-ff", "-m", message, other]).await?;
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str, dry_run: bool) -> Result<()> {
        if dry_run {
            self.run(&["push", "--dry-run", remote, branch]).await?;
        } else {
            self.run(&["push", remote, branch]).await?;
        }
        Ok(())
    }

    async fn fetch_branch(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["fetch", remote, branch]).await?;
        Ok(())
    }

    async fn rebase(&self, onto: &str) -> Result<()> {
        if let Err(e) = self.run(&["rebase", onto]).await {
            // leave the clone usable for the operator
            let _ = self.run_raw(&["rebase", "--abort"]).await;
            return Err(e);
        }
        Ok(())
    }

    async fn cherry_diff(&self, upstream: &str, head: &str) -> Result<Vec<String>> {
        let out = self.run(&["cherry", "-v", upstream, head]).await?;
        Ok(out
            .lines()
            .filter(|l| l.starts_with('+'))
            .map(|l| l.trim_start_matches('+').trim().to_string())
            .collect())
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let output = self.run_raw(&args).await?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            code => Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                code,
                output: output.combined,
            }
            .into()),
        }
    }

    async fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        let relative: Vec<String> = paths
            .iter()
            .map(|p| p.strip_prefix(&self.path).unwrap_or(p).to_string_lossy().to_string())
            .collect();
        let mut args = vec!["add", "-A", "--"];
        args.extend(relative.iter().map(String::as_str));
        self.run(&args).await?;
        self.run(&["commit", "-q", "-m", message]).await?;
        Ok(())
    }

    async fn has_changes(&self, path: &Path) -> Result<bool> {
        let relative = path.strip_prefix(&self.path).unwrap_or(path).to_string_lossy().to_string();
        let status = self.run(&["status", "--porcelain", "--", &relative]).await?;
        Ok(!status.trim().is_empty())
    }

    async fn push_url(&self, remote: &str) -> Result<String> {
        Ok(self
            .run(&["remote", "get-url", "--push", remote])
            .await?
            .trim()
            .to_string())
    }

    fn workdir(&self) -> &Path {
        &self.path
    }
}
