//! Generated "Detailed Changes" between two production commits.

use crate::changelog::{ChangelogTree, DETAILED_CHANGES, PLATFORM_PLACEHOLDER};
use crate::error::Result;
use crate::git::VersionControl;
use crate::steps::{StepReporter, expand_template};
use serde_json::Value;

const PACKAGE_VERSIONS: &str = "release/package-versions.json";
const PINNED_VERSIONS: &str = "release/versions.json";

/// URL templates used for the generated links
#[derive(Debug, Clone)]
pub struct CompareLinks<'a> {
    /// Platform code compare URL (`{old}`, `{new}`)
    pub platform: &'a str,
    /// Upstream package set compare URL (`{old}`, `{new}`)
    pub upstream: &'a str,
}

/// Describe what changed between `old_rev` and `new_rev`.
///
/// Missing or malformed version files only produce warnings.
pub async fn detailed_changes<V: VersionControl>(
    vcs: &V,
    reporter: &dyn StepReporter,
    old_rev: &str,
    new_rev: &str,
    links: &CompareLinks<'_>,
) -> Result<ChangelogTree> {
    let mut tree = ChangelogTree::new();
    tree.section(DETAILED_CHANGES).push_entry(format!(
        "- [platform code]({})",
        expand_template(links.platform, &[("old", old_rev), ("new", new_rev)])
    ));

    match read_pair(vcs, old_rev, new_rev, PACKAGE_VERSIONS).await {
        Ok((old, new)) => {
            let lines = package_version_diff(&old, &new);
            if !lines.is_empty() {
                let nested: String = lines.iter().map(|l| format!("\n    - {l}")).collect();
                tree.section(PLATFORM_PLACEHOLDER).push_entry(format!(
                    "- Pull upstream NixOS changes, security fixes, and package updates:{nested}"
                ));
            }
        }
        Err(e) => {
            log::warn!("{PACKAGE_VERSIONS}: {e}");
            reporter.on_warning(&format!(
                "Could not read '{PACKAGE_VERSIONS}'. Continuing without package versions diff..."
            ));
        }
    }

    match read_pair(vcs, old_rev, new_rev, PINNED_VERSIONS).await {
        Ok((old, new)) => match (upstream_rev(&old), upstream_rev(&new)) {
            (Some(old_up), Some(new_up)) if old_up != new_up => {
                tree.section(DETAILED_CHANGES).push_entry(format!(
                    "- [nixpkgs/upstream changes]({})",
                    expand_template(links.upstream, &[("old", old_up), ("new", new_up)])
                ));
            }
            (Some(_), Some(_)) => {}
            _ => reporter.on_warning(&format!("'{PINNED_VERSIONS}' has no nixpkgs revision")),
        },
        Err(e) => {
            log::warn!("{PINNED_VERSIONS}: {e}");
            reporter.on_warning(&format!(
                "Could not read '{PINNED_VERSIONS}'. Continuing without upstream changelog..."
            ));
        }
    }

    Ok(tree)
}

async fn read_pair<V: VersionControl>(vcs: &V, old_rev: &str, new_rev: &str, path: &str) -> Result<(Value, Value)> {
    let old = vcs.show_json(old_rev, path).await?;
    let new = vcs.show_json(new_rev, path).await?;
    Ok((old, new))
}

fn upstream_rev(versions: &Value) -> Option<&str> {
    versions.get("nixpkgs")?.get("rev")?.as_str()
}

fn package_version(doc: &Value, name: &str) -> Option<String> {
    match doc.get(name)?.get("version")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// One line per package whose version changed, in package name order
pub fn package_version_diff(old: &Value, new: &Value) -> Vec<String> {
    let mut names: Vec<&String> = old.as_object().map(|o| o.keys().collect()).unwrap_or_default();
    if let Some(new_obj) = new.as_object() {
        for name in new_obj.keys() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names.sort();

    names
        .into_iter()
        .filter_map(|name| match (package_version(old, name), package_version(new, name)) {
            (None, Some(_)) => Some(format!("{name}: (old version missing)")),
            (Some(_), None) => Some(format!("{name}: (new version missing)")),
            (Some(o), Some(n)) if o != n => Some(format!("{name}: {o} -> {n}")),
            _ => None,
        })
        .collect()
}
