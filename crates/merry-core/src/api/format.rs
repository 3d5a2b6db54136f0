//! Code formatting through prettier
//!
//! Formatting options come from the project's prettier configuration merged
//! with the options an action passes explicitly.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;

/// Prettier configuration files, in lookup order within one directory
const PRETTIER_FILES: &[&str] = &[
    ".prettierrc",
    ".prettierrc.json",
    ".prettierrc.yaml",
    ".prettierrc.yml",
];

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to run prettier: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write prettier options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("prettier exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("prettier produced invalid UTF-8 output")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[async_trait]
pub trait Formatter: Send + Sync {
    /// Format `source` as the file at `filepath` (the path selects the parser)
    async fn format(
        &self,
        source: &str,
        filepath: &Path,
        options: &Map<String, Value>,
    ) -> Result<String, FormatError>;
}

/// Formatter shelling out to the prettier CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettierFormatter;

impl PrettierFormatter {
    /// Project-local prettier binary if there is one, otherwise the one on PATH
    fn binary(filepath: &Path) -> PathBuf {
        filepath
            .ancestors()
            .skip(1)
            .map(|dir| dir.join("node_modules").join(".bin").join("prettier"))
            .find(|bin| bin.is_file())
            .unwrap_or_else(|| PathBuf::from("prettier"))
    }
}

#[async_trait]
impl Formatter for PrettierFormatter {
    async fn format(
        &self,
        source: &str,
        filepath: &Path,
        options: &Map<String, Value>,
    ) -> Result<String, FormatError> {
        let mut config = tempfile::Builder::new()
            .prefix("merry-prettier")
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer(&mut config, options)?;
        config.flush()?;

        let binary = Self::binary(filepath);
        tracing::debug!(binary = %binary.display(), file = %filepath.display(), "formatting");

        let mut child = TokioCommand::new(&binary)
            .arg("--config")
            .arg(config.path())
            .arg("--stdin-filepath")
            .arg(filepath)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(FormatError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

/// Nearest prettier configuration walking up from `start`
///
/// Returns an empty map when there is none or it cannot be parsed.
pub fn project_options(start: &Path) -> Map<String, Value> {
    for dir in start.ancestors() {
        for file in PRETTIER_FILES {
            let path = dir.join(file);
            if path.is_file() {
                return read_options(&path).unwrap_or_default();
            }
        }

        let manifest = dir.join(crate::manifest::MANIFEST_FILE);
        if let Some(Value::Object(options)) = std::fs::read_to_string(&manifest)
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok())
            .and_then(|mut pkg| pkg.get_mut("prettier").map(Value::take))
        {
            return options;
        }
    }
    Map::new()
}

fn read_options(path: &Path) -> Option<Map<String, Value>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_yaml::from_str::<Value>(&text) {
        Ok(Value::Object(options)) => Some(options),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring prettier config");
            None
        }
    }
}

/// Project options overlaid with explicit ones; explicit keys win
pub fn merge_options(
    project: Map<String, Value>,
    explicit: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut merged = project;
    if let Some(explicit) = explicit {
        for (key, value) in explicit {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
