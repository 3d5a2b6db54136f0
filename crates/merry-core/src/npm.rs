//! npm helpers: install, link, global package roots and dependency checks

use crate::manifest::{PackageManifest, MANIFEST_FILE};
use crate::version;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command as TokioCommand;

#[derive(Debug, Error)]
pub enum NpmError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} exited with code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },
}

#[async_trait]
pub trait PackageManager: Send + Sync {
    /// `npm install <args>` in `dir`
    async fn install(&self, dir: &Path, args: &[String]) -> Result<(), NpmError>;

    /// `npm link <args>` in `dir`
    async fn link(&self, dir: &Path, args: &[String]) -> Result<(), NpmError>;

    /// Folders holding globally installed packages
    async fn global_roots(&self) -> Vec<PathBuf>;
}

/// The npm CLI (plus yarn for its global folder)
#[derive(Debug, Clone, Copy, Default)]
pub struct Npm;

impl Npm {
    async fn run(&self, dir: &Path, subcommand: &str, args: &[String]) -> Result<(), NpmError> {
        let command = format!("npm {} {}", subcommand, args.join(" "))
            .trim_end()
            .to_string();
        tracing::debug!(%command, dir = %dir.display(), "running");

        let spinner = cliclack::spinner();
        spinner.start(format!("{}...", command));

        let output = TokioCommand::new("npm")
            .arg(subcommand)
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| NpmError::Spawn {
                command: command.clone(),
                source,
            });

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                spinner.error(format!("Can not run {}", command));
                return Err(e);
            }
        };

        if !output.status.success() {
            spinner.error(format!("{} failed", command));
            return Err(NpmError::Failed {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        spinner.stop(format!("{} done", command));
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            println!("{}", stdout.trim_end());
        }
        Ok(())
    }
}

#[async_trait]
impl PackageManager for Npm {
    async fn install(&self, dir: &Path, args: &[String]) -> Result<(), NpmError> {
        self.run(dir, "install", args).await
    }

    async fn link(&self, dir: &Path, args: &[String]) -> Result<(), NpmError> {
        self.run(dir, "link", args).await
    }

    async fn global_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();

        if let Some(root) = command_output("npm", &["root", "-g"]).await {
            roots.push(PathBuf::from(root));
        }
        if let Some(dir) = command_output("yarn", &["global", "dir"]).await {
            roots.push(PathBuf::from(dir).join("node_modules"));
        }

        roots.retain(|root| root.is_dir());
        roots.dedup();
        roots
    }
}

/// Trimmed stdout of a successful command
async fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = TokioCommand::new(program)
        .args(args)
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        Ok(output) => {
            tracing::debug!(program, code = ?output.status.code(), "command failed");
            None
        }
        Err(e) => {
            tracing::debug!(program, error = %e, "command not available");
            None
        }
    }
}

/// Declared dependencies of the package in `dir` that are not installed, or
/// whose installed version does not satisfy the declared range
pub fn missing_dependencies(dir: &Path, manifest: &PackageManifest) -> Vec<String> {
    manifest
        .all_dependencies()
        .into_iter()
        .filter(|(name, range)| {
            let installed = dir.join("node_modules").join(name).join(MANIFEST_FILE);
            match PackageManifest::read(&installed) {
                Ok(pkg) => !version::satisfies(&pkg.version, range),
                Err(_) => true,
            }
        })
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Run `npm install` in `dir` when any dependency is missing
///
/// Failures are logged; a plugin with broken dependencies may still load.
pub async fn ensure_dependencies(
    packages: &dyn PackageManager,
    dir: &Path,
    manifest: &PackageManifest,
) -> bool {
    let missing = missing_dependencies(dir, manifest);
    if missing.is_empty() {
        return false;
    }

    tracing::debug!(package = %manifest.name, ?missing, "installing dependencies");
    if let Err(e) = packages.install(dir, &[]).await {
        tracing::debug!(package = %manifest.name, error = %e, "can not install dependencies");
    }
    true
}
