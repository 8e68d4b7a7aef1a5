//! [`MachineFleet`] over DNS and `ssh`.

use crate::error::{FleetError, Result};
use crate::fleet::MachineFleet;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;

/// Remote commands that bring a machine onto its current channel
const REMEDIATION_COMMANDS: &[&[&str]] = &[
    &["sudo", "fc-manage", "update-enc"],
    &["sudo", "systemctl", "start", "fc-update-channel.service"],
    &["sudo", "fc-maintenance", "run", "--run-all-now"],
];

/// Marker printed by the maintenance run when it reboots the machine
const REBOOT_MARKER: &str = "maintenance-reboot";

const REBOOT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const REBOOT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Machine fleet reached through `ssh`
#[derive(Debug, Clone)]
pub struct SshFleet {
    scan_limit: u32,
    inventory_host: Option<String>,
}

struct RemoteOutput {
    code: Option<i32>,
    stdout: String,
    combined: String,
}

impl SshFleet {
    /// Scan `<namespace>00` up to `scan_limit` machines; `inventory_host` runs the inventory refresh
    pub fn new(scan_limit: u32, inventory_host: Option<String>) -> Self {
        Self {
            scan_limit: scan_limit.min(100),
            inventory_host,
        }
    }

    async fn ssh(&self, machine: &str, command: &[&str]) -> Result<RemoteOutput> {
        let line = format!("ssh {machine} {}", command.join(" "));
        log::debug!("$ {line}");
        let output = Command::new("ssh")
            .arg("-6")
            .arg(machine)
            .args(command)
            .output()
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let combined = format!("{stdout}{}", String::from_utf8_lossy(&output.stderr));
        log::trace!("{combined}");
        Ok(RemoteOutput {
            code: output.status.code(),
            stdout,
            combined,
        })
    }

    async fn ssh_checked(&self, machine: &str, command: &[&str]) -> Result<String> {
        let output = self.ssh(machine, command).await?;
        if output.code != Some(0) {
            return Err(FleetError::RemoteCommandFailed {
                machine: machine.to_string(),
                command: command.join(" "),
                code: output.code,
                output: output.combined,
            }
            .into());
        }
        Ok(output.stdout)
    }

    async fn wait_for_reboot(&self, machine: &str) -> Result<()> {
        log::info!("Waiting for {machine} to come back after reboot");
        let started = Instant::now();
        // give the machine time to actually go down
        tokio::time::sleep(REBOOT_POLL_INTERVAL).await;
        loop {
            if let Ok(out) = self.ssh(machine, &["echo"]).await
                && out.code == Some(0)
            {
                return Ok(());
            }
            if started.elapsed() > REBOOT_TIMEOUT {
                return Err(FleetError::RemoteCommandFailed {
                    machine: machine.to_string(),
                    command: "echo".to_string(),
                    code: None,
                    output: format!("not reachable {}s after reboot", REBOOT_TIMEOUT.as_secs()),
                }
                .into());
            }
            tokio::time::sleep(REBOOT_POLL_INTERVAL).await;
        }
    }
}

impl MachineFleet for SshFleet {
    async fn refresh_inventory(&self) -> Result<()> {
        let Some(host) = &self.inventory_host else {
            log::debug!("No inventory host configured, skipping refresh");
            return Ok(());
        };
        let output = self
            .ssh(host, &["sudo", "systemctl", "start", "update_rolling_releases"])
            .await?;
        if output.code != Some(0) {
            log::warn!("Inventory refresh on {host} failed:\n{}", output.combined);
        }
        Ok(())
    }

    async fn discover(&self, namespace: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for i in 0..self.scan_limit {
            let machine = format!("{namespace}{i:02}");
            if tokio::net::lookup_host((machine.as_str(), 22)).await.is_ok() {
                log::debug!("Found machine {machine}");
                found.push(machine);
            }
        }
        Ok(found)
    }

    async fn system_name(&self, machine: &str) -> Result<String> {
        let out = self
            .ssh_checked(machine, &["cat", "/run/current-system/nixos-version"])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn remediate(&self, machine: &str) -> Result<()> {
        for command in REMEDIATION_COMMANDS {
            let output = self.ssh(machine, command).await?;
            if output.code == Some(0) {
                continue;
            }
            if output.combined.contains(REBOOT_MARKER) {
                self.wait_for_reboot(machine).await?;
                continue;
            }
            return Err(FleetError::RemoteCommandFailed {
                machine: machine.to_string(),
                command: command.join(" "),
                code: output.code,
                output: output.combined,
            }
            .into());
        }
        Ok(())
    }
}
