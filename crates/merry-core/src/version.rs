//! Version checks between the CLI and the plugins it loads

use anyhow::Result;
use semver::{Version, VersionReq};

/// Version of the running CLI
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compare the CLI version against a plugin's `engines` requirement.
/// Returns a warning message if the plugin expects another CLI version.
pub fn check_compatibility(cli_version: &str, plugin: &str, requirement: &str) -> Option<String> {
    let cli_ver = match parse_version(cli_version) {
        Ok(v) => v,
        Err(_) => return None, // Can't compare, skip warning
    };

    let req = match VersionReq::parse(requirement.trim()) {
        Ok(r) => r,
        Err(_) => return None,
    };

    if req.matches(&cli_ver) {
        None
    } else {
        Some(format!(
            "Warning: plugin {} was built for CLI version {}.\n\
             You are running version {}.",
            plugin, requirement, cli_version
        ))
    }
}

/// Check an installed version string against a declared range.
/// Unparseable input counts as satisfied.
pub fn satisfies(installed: &str, range: &str) -> bool {
    let Ok(version) = parse_version(installed) else {
        return true;
    };
    match VersionReq::parse(range.trim()) {
        Ok(req) => req.matches(&version),
        Err(_) => true,
    }
}

/// Parse version string, handling various formats
pub fn parse_version(version_str: &str) -> Result<Version> {
    // Remove leading 'v' if present
    let cleaned = version_str.trim();
    let cleaned = cleaned.strip_prefix('v').unwrap_or(cleaned);
    Version::parse(cleaned).map_err(|e| anyhow::anyhow!("Invalid version '{}': {}", version_str, e))
}
