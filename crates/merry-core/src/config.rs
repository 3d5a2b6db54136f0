//! Configuration resolution
//!
//! Settings come from the `merry` key of the nearest `package.json`. When that
//! key is missing or empty, rc-style sources are merged instead (system files,
//! home files, the closest `.merryrc`, then `merry_*` environment variables).
//! `prefix` and `namespace` are fixed and cannot be overridden.

use crate::manifest::find_up;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Namespace used for the manifest key, rc file names and env variables
pub const NAMESPACE: &str = "merry";

/// Folder/package name prefix identifying plugins
pub const PREFIX: &str = "merry-plugin-";

pub const DEFAULT_DIST: &str = "src";
pub const DEFAULT_PLUGIN_DIR: &str = "plugins";

/// Resolved configuration, shared by every plugin of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub namespace: String,

    /// Where generated files are written to
    pub dist: String,

    /// Folder (relative to the project) holding local plugins
    pub plugin_dir: String,

    pub prefix: String,

    /// Any other user keys, kept verbatim for plugins to read
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error)]
enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Where configuration is looked up
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Project working directory
    pub cwd: PathBuf,
    pub home: Option<PathBuf>,
    /// System configuration root (`/etc` on unix)
    pub etc: Option<PathBuf>,
    /// `merry_*` environment variables
    pub env: Vec<(String, String)>,
}

impl ConfigSources {
    /// Sources of the running process
    pub fn from_process() -> Self {
        let env_prefix = format!("{}_", NAMESPACE);
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            home: dirs::home_dir(),
            etc: cfg!(unix).then(|| PathBuf::from("/etc")),
            env: std::env::vars()
                .filter(|(key, _)| key.starts_with(&env_prefix))
                .collect(),
        }
    }

    /// Sources rooted at a project directory only (no home, system or env)
    pub fn project(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Self::default()
        }
    }
}

impl Config {
    /// Resolve configuration from the given sources
    pub fn resolve(sources: &ConfigSources) -> Self {
        let raw = project_config(&sources.cwd)
            .or_else(|| rc_config(sources))
            .unwrap_or_default();
        Self::from_raw(raw)
    }

    /// Apply defaults and the fixed keys to a raw settings object
    pub fn from_raw(mut raw: Map<String, Value>) -> Self {
        let dist = take_string(&mut raw, "dist").unwrap_or_else(|| DEFAULT_DIST.to_string());
        let plugin_dir =
            take_string(&mut raw, "pluginDir").unwrap_or_else(|| DEFAULT_PLUGIN_DIR.to_string());

        // not user configurable
        raw.remove("prefix");
        raw.remove("namespace");

        Self {
            namespace: NAMESPACE.to_string(),
            dist,
            plugin_dir,
            prefix: PREFIX.to_string(),
            extra: raw,
        }
    }

    /// Whether a folder or package name follows the plugin naming convention
    pub fn is_plugin_name(&self, name: &str) -> bool {
        name.contains(&self.prefix)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_raw(Map::new())
    }
}

static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

/// Process-wide configuration, resolved on first call
pub fn get_config() -> Arc<Config> {
    CONFIG
        .get_or_init(|| {
            let config = Config::resolve(&ConfigSources::from_process());
            tracing::debug!(?config, "loading configurations");
            Arc::new(config)
        })
        .clone()
}

fn take_string(raw: &mut Map<String, Value>, key: &str) -> Option<String> {
    match raw.remove(key)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The namespaced key of the nearest package.json, if present and non-empty
fn project_config(cwd: &Path) -> Option<Map<String, Value>> {
    let manifest_path = find_up(cwd, "package.json")?;
    let layer = match read_layer(&manifest_path) {
        Ok(layer) => layer?,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable package.json");
            return None;
        }
    };

    match layer.get(NAMESPACE) {
        Some(Value::Object(conf)) if !conf.is_empty() => Some(conf.clone()),
        _ => None,
    }
}

/// Merge rc-style sources, lowest precedence first
fn rc_config(sources: &ConfigSources) -> Option<Map<String, Value>> {
    let mut files = Vec::new();
    if let Some(etc) = &sources.etc {
        files.push(etc.join(format!("{}rc", NAMESPACE)));
        files.push(etc.join(NAMESPACE).join("config"));
    }
    if let Some(home) = &sources.home {
        files.push(home.join(".config").join(NAMESPACE));
        files.push(home.join(".config").join(NAMESPACE).join("config"));
        files.push(home.join(format!(".{}", NAMESPACE)).join("config"));
        files.push(home.join(format!(".{}rc", NAMESPACE)));
    }
    // every ancestor rc, farthest first so the closest one wins
    let rc_name = format!(".{}rc", NAMESPACE);
    let mut local: Vec<PathBuf> = sources
        .cwd
        .ancestors()
        .map(|dir| dir.join(&rc_name))
        .filter(|path| path.is_file())
        .collect();
    local.reverse();
    for path in local {
        // the home rc may also be an ancestor
        if !files.contains(&path) {
            files.push(path);
        }
    }

    let mut merged: Option<Map<String, Value>> = None;
    for path in files.iter().filter(|p| p.is_file()) {
        match read_layer(path) {
            Ok(Some(layer)) => merged.get_or_insert_with(Map::new).extend(layer),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "ignoring configuration source"),
        }
    }

    let env_prefix = format!("{}_", NAMESPACE);
    for (key, value) in &sources.env {
        if let Some(name) = key.strip_prefix(&env_prefix) {
            if !name.is_empty() {
                merged
                    .get_or_insert_with(Map::new)
                    .insert(name.to_string(), Value::String(value.clone()));
            }
        }
    }

    merged
}

/// Read a JSON or YAML object; `Ok(None)` when the file holds no object
fn read_layer(path: &Path) -> Result<Option<Map<String, Value>>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(None);
    }

    // YAML is a superset of JSON, so one parser covers both formats
    let value: Value = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Ok(None),
    }
}
