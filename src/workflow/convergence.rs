//! Checking that test machines run the expected build.

use crate::error::{FleetError, Result};
use crate::fleet::MachineFleet;
use crate::steps::StepReporter;

/// Verify every machine in `namespace` runs `expected`, remediating stragglers.
///
/// Each machine gets up to `attempts` remediation runs; one that still reports a different
/// system afterwards fails the check. Returns the machines that were verified.
pub async fn verify_machines_current<F: MachineFleet>(
    fleet: &F,
    reporter: &dyn StepReporter,
    namespace: &str,
    expected: &str,
    attempts: u32,
) -> Result<Vec<String>> {
    reporter.on_message(&format!("Expecting machines to run {expected}"));

    let machines = fleet.discover(namespace).await?;
    if machines.is_empty() {
        return Err(FleetError::NoMachines {
            namespace: namespace.to_string(),
        }
        .into());
    }
    reporter.on_message(&format!("Found {}", machines.join(", ")));

    for machine in &machines {
        let mut actual = fleet.system_name(machine).await?;
        let mut tries = 0;
        while actual != expected && tries < attempts {
            reporter.on_warning(&format!(
                "{machine} has not switched yet (running {actual}); running maintenance"
            ));
            fleet.remediate(machine).await?;
            tries += 1;
            actual = fleet.system_name(machine).await?;
        }
        if actual != expected {
            return Err(FleetError::NotConverged {
                machine: machine.clone(),
                expected: expected.to_string(),
                actual,
                attempts: tries,
            }
            .into());
        }
        reporter.on_message(&format!("{machine} switched successfully"));
    }

    Ok(machines)
}
