//! Package manifest (`package.json`) types and lookup

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "package.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// The fields of a package manifest the tool cares about
///
/// Unknown keys are preserved in `rest` so a manifest can be rewritten
/// without losing data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub description: String,

    /// Entry point of the package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub dependencies: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub dev_dependencies: Map<String, Value>,

    /// Version requirements, e.g. `{ "merry": "^0.1" }`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub engines: Map<String, Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl PackageManifest {
    /// Read and parse a manifest file
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Dependency names, `dependencies` first then new `devDependencies`,
    /// in declaration order
    pub fn all_dependencies(&self) -> Vec<(&str, &str)> {
        let mut merged: Vec<(&str, &str)> = Vec::new();
        for (name, range) in self.dependencies.iter().chain(self.dev_dependencies.iter()) {
            let range = range.as_str().unwrap_or("*");
            match merged.iter_mut().find(|(n, _)| *n == name.as_str()) {
                Some(entry) => entry.1 = range,
                None => merged.push((name.as_str(), range)),
            }
        }
        merged
    }

    /// Requirement declared for an engine, if any
    pub fn engine(&self, engine: &str) -> Option<&str> {
        self.engines.get(engine).and_then(Value::as_str)
    }
}

/// Find `file` in `start` or the closest ancestor directory
pub fn find_up(start: &Path, file: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file))
        .find(|candidate| candidate.is_file())
}

/// Resolve an installed package the way node does: `node_modules/<name>`
/// in `start` or any ancestor
pub fn resolve_package(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join("node_modules").join(name))
        .find(|candidate| candidate.join(MANIFEST_FILE).is_file())
}
