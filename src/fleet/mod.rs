//! Release test machines.
//!
//! Each platform version has a staging and a production set of test machines, named
//! `<namespace>00` to `<namespace>99`. After a build is released they are expected to switch
//! to the new system; [`MachineFleet`] is how the workflow inspects and nudges them.

mod ssh;

pub use ssh::SshFleet;

use crate::error::Result;
use std::future::Future;

/// Operations on the release test machines
pub trait MachineFleet {
    /// Ask the inventory to pick up newly released builds
    fn refresh_inventory(&self) -> impl Future<Output = Result<()>>;

    /// Machines in `namespace` that resolve
    fn discover(&self, namespace: &str) -> impl Future<Output = Result<Vec<String>>>;

    /// System name `machine` currently runs
    fn system_name(&self, machine: &str) -> impl Future<Output = Result<String>>;

    /// Make `machine` fetch and switch to its current channel, waiting out a reboot
    fn remediate(&self, machine: &str) -> impl Future<Output = Result<()>>;
}
