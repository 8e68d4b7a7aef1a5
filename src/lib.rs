//! # Release Promoter
//!
//! Resumable promotion of platform branches from staging to production.
//!
//! A release cycle covers one or more platform versions. For each version the branch
//! workflow walks a fixed list of steps: verify the staging build and test machines,
//! collect the changelog, merge staging into production, push, verify the production
//! build and machines, and finally mark the version as tested. Every completed step is
//! persisted immediately, so a run that stops for any reason continues where it left off.
//!
//! ## Usage
//!
//! ```bash
//! release start 2025_004 2025-03-10   # discover branches with pending changes
//! release branch 24.11                # run or resume the promotion of 24.11
//! release status                      # show progress
//! release doc                         # aggregate the changelog and finish
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod approval;
pub mod changelog;
pub mod cli;
pub mod config;
pub mod error;
pub mod fleet;
pub mod git;
pub mod hydra;
pub mod metadata;
pub mod state;
pub mod steps;
pub mod workflow;

pub use approval::ApprovalProvider;
pub use changelog::ChangelogTree;
pub use cli::Args;
pub use config::PromotionConfig;
pub use error::{ReleaseError, Result};
pub use fleet::MachineFleet;
pub use git::VersionControl;
pub use hydra::BuildSystem;
pub use metadata::ReleaseMetadata;
pub use state::{Branch, Release, StateManager};
pub use steps::{StepReporter, StepRunner, Workflow};
pub use workflow::{BranchWorkflow, DocWorkflow, Services};
