//! Command line argument parsing.
//!
//! Global flags override the `RELEASE_*` environment; subcommands map one to one onto
//! the release operations.

use crate::cli::OutputManager;
use crate::config::PromotionConfig;
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Promote platform branches from staging to production
#[derive(Parser, Debug)]
#[command(
    name = "release",
    version,
    about = "Promote platform branches from staging to production",
    long_about = "Drive a release cycle step by step. Every completed step is recorded in the state file,
so an interrupted run continues where it stopped.

Usage:
  release start 2025_004 2025-03-10
  release branch 24.11
  release branch 24.11 --reset-from push
  release doc"
)]
pub struct Args {
    /// State file of the current release
    #[arg(long, global = true, env = "RELEASE_STATE_FILE", value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Directory holding the repository mirror and generated files
    #[arg(long, global = true, env = "RELEASE_WORK_DIR", value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Give up waiting for a build after this many seconds; 0 waits indefinitely
    #[arg(long, global = true, value_name = "SECS")]
    pub build_timeout: Option<u64>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Operation to perform
    #[command(subcommand)]
    pub command: Command,
}

/// Release operations
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start a new release cycle
    Start {
        /// Release id in YYYY_NNN form; prompted for when omitted
        release_id: Option<String>,
        /// Release date as YYYY-MM-DD; prompted for when omitted
        date: Option<String>,
    },

    /// Show the state of the current release
    Status {
        /// Print the raw state document
        #[arg(long)]
        json: bool,
    },

    /// Run or resume the promotion of one platform version
    Branch {
        /// Platform version, e.g. 24.11
        version: String,
        /// Forget this step and every later one before running
        #[arg(long, value_name = "STEP")]
        reset_from: Option<String>,
    },

    /// Leave a platform version out of this release
    Ignore {
        /// Platform version, e.g. 24.11
        version: String,
    },

    /// Aggregate the changelog and finish the release
    Doc,
}

impl Command {
    /// Subcommand name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Status { .. } => "status",
            Command::Branch { .. } => "branch",
            Command::Ignore { .. } => "ignore",
            Command::Doc => "doc",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Configuration derived from the environment and command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: OutputManager,
    promotion: PromotionConfig,
}

impl RuntimeConfig {
    /// Read the environment and apply the flags of `args` on top
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut promotion = PromotionConfig::from_env()?;
        if let Some(path) = &args.state_file {
            promotion.state_file = path.clone();
        }
        if let Some(dir) = &args.work_dir {
            promotion.work_dir = dir.clone();
        }
        if let Some(secs) = args.build_timeout {
            promotion.poll.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(Self {
            output: OutputManager::new(args.verbose, false),
            promotion,
        })
    }

    /// Terminal output
    pub fn output(&self) -> &OutputManager {
        &self.output
    }

    /// Effective promotion settings
    pub fn promotion(&self) -> &PromotionConfig {
        &self.promotion
    }
}
