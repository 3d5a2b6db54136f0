//! Finding plugin candidates on disk

use crate::config::Config;
use crate::manifest::{resolve_package, PackageManifest, MANIFEST_FILE};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A plugin folder found by scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// Folder name, `@scope/name` for scoped packages
    pub id: String,
    pub path: PathBuf,
}

/// Sub-folders of `dir` whose name contains the plugin prefix, sorted.
/// With `scopes`, `@scope` folders are searched one level deeper.
pub fn scan(dir: &Path, config: &Config, scopes: bool) -> Vec<Found> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "plugin folder does not exist");
        return Vec::new();
    }

    let max_depth = if scopes { 2 } else { 1 };
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 1 || in_scope(entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?;
            if !config.is_plugin_name(name) {
                return None;
            }
            let id = if entry.depth() == 2 {
                let scope = entry.path().parent()?.file_name()?.to_str()?;
                format!("{}/{}", scope, name)
            } else {
                name.to_string()
            };
            Some(Found {
                id,
                path: entry.path().to_path_buf(),
            })
        })
        .collect()
}

fn in_scope(path: &Path) -> bool {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('@'))
}

/// A plugin declared in the project manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    pub name: String,
    /// `None` when the package is not installed
    pub path: Option<PathBuf>,
}

/// Prefixed `dependencies` then `devDependencies` of `<project>/package.json`
pub fn declared(project_dir: &Path, config: &Config) -> Vec<Declared> {
    let manifest_path = project_dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Vec::new();
    }
    let manifest = match PackageManifest::read(&manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::debug!(error = %e, "can not read project manifest");
            return Vec::new();
        }
    };

    manifest
        .all_dependencies()
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| config.is_plugin_name(name))
        .map(|name| Declared {
            name: name.to_string(),
            path: resolve_package(project_dir, name),
        })
        .collect()
}
