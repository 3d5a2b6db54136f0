//! Plugins described in YAML
//!
//! ```yaml
//! commands:
//!   - command: "component [name]"
//!     options:
//!       - flags: "-S, --style [style]"
//!         description: Stylesheet flavour
//!     prompts:
//!       - name: name
//!         message: Component name
//!         default: "{{ name }}"
//!     actions:
//!       - template: templates/component.j2
//!         path: "{{ dist }}/{{ name | pascal_case }}.tsx"
//! ```

use crate::api::{Action, ActionResult, CompileOptions, PluginApi, Question, TemplateSource};
use crate::dispatcher::{CommandHandler, CommandInput};
use crate::plugin::{Plugin, PluginError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginDefinition {
    #[serde(default)]
    pub commands: Vec<DeclaredCommand>,
}

impl PluginDefinition {
    pub fn read(path: &Path) -> Result<Self, PluginError> {
        let definition_error = |message: String| PluginError::Definition {
            path: path.to_path_buf(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| definition_error(e.to_string()))?;
        serde_yaml::from_str(&text).map_err(|e| definition_error(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredCommand {
    /// Command spec, e.g. `component [name]`
    pub command: String,

    /// Overrides the package description
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub options: Vec<DeclaredOption>,

    #[serde(default)]
    pub prompts: Vec<Question>,

    #[serde(default)]
    pub actions: Vec<Option<Action>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredOption {
    pub flags: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub default: Option<Value>,
}

/// Plugin backed by a YAML definition file
#[derive(Debug, Clone)]
pub struct DeclarativePlugin {
    path: PathBuf,
}

impl DeclarativePlugin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Plugin for DeclarativePlugin {
    fn install(&self, api: &PluginApi) -> Result<(), PluginError> {
        let definition = PluginDefinition::read(&self.path)?;

        for declared in definition.commands {
            let mut builder = api.command(declared.command.clone());
            if let Some(description) = &declared.description {
                builder = builder.description(description.clone());
            }
            for option in &declared.options {
                builder = match &option.default {
                    Some(default) => builder.option_with_default(
                        option.flags.clone(),
                        option.description.clone(),
                        default.clone(),
                    ),
                    None => builder.option(option.flags.clone(), option.description.clone()),
                };
            }
            builder.action(DeclaredHandler {
                command: Arc::new(declared),
            })?;
        }
        Ok(())
    }
}

struct DeclaredHandler {
    command: Arc<DeclaredCommand>,
}

#[async_trait]
impl CommandHandler for DeclaredHandler {
    async fn run(&self, api: &PluginApi, input: CommandInput) -> anyhow::Result<()> {
        let data = collect_data(api, &self.command.prompts, input.into_values())?;
        let reports = api.run_actions(&self.command.actions, &data).await;

        let failed = reports
            .iter()
            .filter(|r| matches!(r.result, ActionResult::Failed(_)))
            .count();
        if failed > 0 {
            api.logger().warn(format!(
                "{} of {} actions failed",
                failed,
                self.command.actions.len()
            ));
        }
        Ok(())
    }
}

/// Template data: input values, then prompt answers, then `dist`
fn collect_data(
    api: &PluginApi,
    prompts: &[Question],
    mut data: Map<String, Value>,
) -> anyhow::Result<Map<String, Value>> {
    for question in prompts {
        let mut question = question.clone();
        // string defaults may refer to earlier values
        if let Some(Value::String(default)) = &question.default {
            let rendered = api.compile(
                &TemplateSource::inline(default.clone()),
                &data,
                CompileOptions::default(),
            )?;
            question.default = Some(Value::String(rendered));
        }
        let answers = api.prompt(std::slice::from_ref(&question))?;
        data.extend(answers);
    }

    if !data.contains_key("dist") {
        data.insert("dist".to_string(), Value::String(api.config().dist.clone()));
    }
    Ok(data)
}
