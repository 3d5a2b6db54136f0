//! Render, format and write files
//!
//! Every write of an existing file goes through the conflict prompt; nothing
//! is overwritten without an explicit answer.

use super::format::{self, FormatError};
use super::prompt::ConflictChoice;
use super::template::{CompileOptions, TemplateSource};
use super::{diff, PluginApi};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read template {source_name}: {source}")]
    TemplateRead {
        source_name: String,
        source: std::io::Error,
    },

    #[error("failed to render template: {0}")]
    Render(#[from] minijinja::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// What happened to a destination file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Overwritten,
    /// The user aborted; the existing file is untouched
    Skipped,
}

/// Formatting requested by an action
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormatSetting {
    /// `true`: project configuration only
    Enabled(bool),
    /// Options merged over the project configuration
    Options(Map<String, Value>),
}

/// One file to generate
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Action {
    /// Destination, itself a template
    #[serde(default)]
    pub path: String,

    #[serde(alias = "templateFile")]
    pub template: TemplateSource,

    #[serde(default)]
    pub format: Option<FormatSetting>,
}

impl Action {
    pub fn new(path: impl Into<String>, template: impl Into<TemplateSource>) -> Self {
        Self {
            path: path.into(),
            template: template.into(),
            format: None,
        }
    }

    pub fn formatted(mut self, format: FormatSetting) -> Self {
        self.format = Some(format);
        self
    }
}

#[derive(Debug)]
pub enum ActionResult {
    /// Empty slot or no destination
    NotRun,
    Written(WriteOutcome),
    Failed(PipelineError),
}

#[derive(Debug)]
pub struct ActionReport {
    pub index: usize,
    pub path: Option<String>,
    pub result: ActionResult,
}

impl PluginApi {
    /// Write `content` to `path`, asking before touching an existing file
    pub async fn write(
        &self,
        path: impl AsRef<Path>,
        content: &str,
    ) -> Result<WriteOutcome, PipelineError> {
        let path = self.resolve(path);
        if !path.exists() {
            self.write_checked(&path, content)?;
            return Ok(WriteOutcome::Created);
        }

        loop {
            let choice = self
                .services()
                .prompter
                .resolve_conflict(&path)
                .map_err(PipelineError::Prompt)?;

            match choice {
                ConflictChoice::Overwrite => {
                    self.write_checked(&path, content)?;
                    return Ok(WriteOutcome::Overwritten);
                }
                ConflictChoice::ShowDiff => {
                    let existing = std::fs::read_to_string(&path).map_err(|source| {
                        PipelineError::Write {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    diff::print(&existing, content).map_err(|source| PipelineError::Write {
                        path: path.clone(),
                        source,
                    })?;
                }
                ConflictChoice::Abort => {
                    tracing::debug!(path = %path.display(), "write aborted");
                    return Ok(WriteOutcome::Skipped);
                }
            }
        }
    }

    fn write_checked(&self, path: &Path, content: &str) -> Result<(), PipelineError> {
        self.write_file(path, content)
            .map(|_| ())
            .map_err(|source| PipelineError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Destination path: backslashes normalized, then rendered as a template
    fn destination<S: Serialize + ?Sized>(
        &self,
        dest: &str,
        data: &S,
    ) -> Result<String, PipelineError> {
        let dest = dest.replace('\\', "/");
        self.compile(&TemplateSource::inline(dest), data, CompileOptions::default())
    }

    /// Compile `template` and write it to the rendered `dest`
    pub async fn tmpl<S: Serialize + Sync + ?Sized>(
        &self,
        template: &TemplateSource,
        dest: &str,
        data: &S,
    ) -> Result<WriteOutcome, PipelineError> {
        let dest = self.destination(dest, data)?;
        let content = self.compile(template, data, CompileOptions::default())?;
        self.write(dest, &content).await
    }

    /// As [`PluginApi::tmpl`], with the content formatted before writing
    pub async fn tmpl_with_format<S: Serialize + Sync + ?Sized>(
        &self,
        template: &TemplateSource,
        dest: &str,
        data: &S,
        options: Option<&Map<String, Value>>,
    ) -> Result<WriteOutcome, PipelineError> {
        let dest = self.destination(dest, data)?;
        let content = self.compile(template, data, CompileOptions::default())?;
        let content = self.format(&content, Path::new(&dest), options).await?;
        self.write(dest, &content).await
    }

    /// Format `code` with the project configuration merged with `options`
    pub async fn format(
        &self,
        code: &str,
        filepath: &Path,
        options: Option<&Map<String, Value>>,
    ) -> Result<String, PipelineError> {
        let merged = format::merge_options(format::project_options(self.project_dir()), options);
        let filepath = self.resolve(filepath);
        Ok(self
            .services()
            .formatter
            .format(code, &filepath, &merged)
            .await?)
    }

    /// Run actions one after another; a failing action does not stop the rest
    pub async fn run_actions<S: Serialize + Sync + ?Sized>(
        &self,
        actions: &[Option<Action>],
        data: &S,
    ) -> Vec<ActionReport> {
        let mut reports = Vec::with_capacity(actions.len());

        for (index, action) in actions.iter().enumerate() {
            let action = match action {
                Some(action) if !action.path.is_empty() => action,
                other => {
                    reports.push(ActionReport {
                        index,
                        path: other.as_ref().map(|a| a.path.clone()),
                        result: ActionResult::NotRun,
                    });
                    continue;
                }
            };

            let outcome = match &action.format {
                None | Some(FormatSetting::Enabled(false)) => {
                    self.tmpl(&action.template, &action.path, data).await
                }
                Some(FormatSetting::Enabled(true)) => {
                    self.tmpl_with_format(&action.template, &action.path, data, None)
                        .await
                }
                Some(FormatSetting::Options(options)) => {
                    self.tmpl_with_format(&action.template, &action.path, data, Some(options))
                        .await
                }
            };

            let result = match outcome {
                Ok(outcome) => ActionResult::Written(outcome),
                Err(e) => {
                    self.logger()
                        .error(format!("action {} ({}) failed: {}", index, action.path, e));
                    ActionResult::Failed(e)
                }
            };
            reports.push(ActionReport {
                index,
                path: Some(action.path.clone()),
                result,
            });
        }

        reports
    }
}
