//! Changelog handling.
//!
//! Fragments are collected from `changelog.d/` on the staging branch, accumulated per branch,
//! enriched with generated details and finally aggregated into one release changelog.

mod detailed;
mod tree;

pub use detailed::{CompareLinks, detailed_changes, package_version_diff};
pub use tree::ChangelogTree;

/// Section receiving generated links
pub const DETAILED_CHANGES: &str = "Detailed Changes";

/// Section name fragments use for the platform version they land on
pub const PLATFORM_PLACEHOLDER: &str = "NixOS XX.XX platform";

/// Section describing operator-visible impact
pub const IMPACT: &str = "Impact";

/// Section for documentation changes
pub const DOCUMENTATION: &str = "Documentation";

/// Directory holding changelog fragments, relative to the repository root
pub const FRAGMENT_DIR: &str = "changelog.d";

/// Accumulated changelog file inside [`FRAGMENT_DIR`]
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";

/// Platform section title for `version`
pub fn platform_section(version: &str) -> String {
    format!("NixOS {version} platform")
}

/// Header placed above the changelog text handed to an editor
pub const EDITOR_HEADER: &str = "<!-- Generated Changelog. Adjust as necessary. -->";
