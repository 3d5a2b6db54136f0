//! Plugins shipped with the CLI

pub mod config;
pub mod dl;
pub mod new;
pub mod scaffold;

use crate::loader::{BuiltinModules, Candidate};

pub const CONFIG: &str = "merry-plugin-config";
pub const NEW: &str = "merry-plugin-new";
pub const PLUGIN: &str = "merry-plugin-plugin";
pub const DL: &str = "merry-plugin-dl";

/// Package names and descriptions, in load order
const BUNDLED: &[(&str, &str)] = &[
    (CONFIG, "Show or change merry configurations"),
    (NEW, "Create a new project from a GitHub repository"),
    (PLUGIN, "Create a new merry plugin"),
    (DL, "Download a file and optionally extract it"),
];

pub fn modules() -> BuiltinModules {
    BuiltinModules::new()
        .with(CONFIG, config::ConfigPlugin)
        .with(NEW, new::NewPlugin)
        .with(PLUGIN, scaffold::ScaffoldPlugin)
        .with(DL, dl::DownloadPlugin)
}

pub fn candidates() -> Vec<Candidate> {
    BUNDLED
        .iter()
        .map(|(name, description)| Candidate::bundled(*name, *description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_candidate_has_a_module() {
        let modules = modules();
        let names: Vec<_> = modules.names().collect();
        for candidate in candidates() {
            assert!(names.contains(&candidate.id.as_str()), "{}", candidate.id);
        }
    }
}
