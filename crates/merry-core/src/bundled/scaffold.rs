//! `plugin`: scaffold a new declarative plugin package

use crate::api::{Action, PluginApi, Question, TemplateSource};
use crate::dispatcher::{CommandHandler, CommandInput};
use crate::plugin::{Plugin, PluginError};
use crate::version::CLI_VERSION;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const README: &str = include_str!("../../templates/plugin/README.md.j2");
const PACKAGE: &str = include_str!("../../templates/plugin/package.json.j2");
const DEFINITION: &str = include_str!("../../templates/plugin/plugin.yaml.j2");
const COMPONENT: &str = include_str!("../../templates/plugin/component.j2");
const STYLE: &str = include_str!("../../templates/plugin/style.j2");
const GITIGNORE: &str = include_str!("../../templates/plugin/gitignore");
const NPMIGNORE: &str = include_str!("../../templates/plugin/npmignore");

pub struct ScaffoldPlugin;

impl Plugin for ScaffoldPlugin {
    fn install(&self, api: &PluginApi) -> Result<(), PluginError> {
        api.command("plugin [name]")
            .option("-L, --local", "create a local plugin in the plugin folder")
            .option("-R, --registry [registry]", "npm registry")
            .option("--no-link", "skip npm link")
            .action(ScaffoldCommand)?;
        Ok(())
    }
}

struct ScaffoldCommand;

#[async_trait]
impl CommandHandler for ScaffoldCommand {
    async fn run(&self, api: &PluginApi, input: CommandInput) -> Result<()> {
        let answers = api.prompt(&[
            Question::input("name", "Your plugin name?")
                .required()
                .with_default(input.get_str("name").unwrap_or_default()),
            Question::input("description", "Descriptions for plugin?"),
        ])?;
        let name = answers
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .context("plugin name is required")?;
        let description = answers
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let local = input.flag("local");
        let target = target_dir(api, name, local);
        let data = json!({
            "name": name,
            "package_name": api.pretty_name(name),
            "description": description,
            "namespace": api.config().namespace,
            "cli_version": CLI_VERSION,
        });

        let reports = api.run_actions(&actions(&target, local), &data).await;
        let failed = reports
            .iter()
            .filter(|r| matches!(r.result, crate::api::ActionResult::Failed(_)))
            .count();
        if failed > 0 {
            anyhow::bail!("{} files could not be written", failed);
        }

        if !local && input.flag("link") {
            let args: Vec<String> = input
                .get_str("registry")
                .map(|registry| vec![format!("--registry={}", registry)])
                .unwrap_or_default();
            if let Err(e) = api.npm().link(&target, &args).await {
                api.logger().warn(format!("Can not run npm link: {}", e));
            }
        }

        api.log(format!("plugin created at {}", target.display()));
        Ok(())
    }
}

/// `<project>/<pluginDir>/<prefix><name>` for local plugins, else
/// `<project>/<prefix><name>`
fn target_dir(api: &PluginApi, name: &str, local: bool) -> PathBuf {
    let package = api.pretty_name(name);
    if local {
        api.project_dir()
            .join(&api.config().plugin_dir)
            .join(package)
    } else {
        api.project_dir().join(package)
    }
}

fn actions(target: &Path, local: bool) -> Vec<Option<Action>> {
    let action = |file: &str, template: &str| {
        Some(Action::new(
            target.join(file).to_string_lossy(),
            TemplateSource::Inline(template.to_string()),
        ))
    };

    vec![
        action("README.md", README),
        action("package.json", PACKAGE),
        action("plugin.yaml", DEFINITION),
        action("templates/component.j2", COMPONENT),
        action("templates/style.j2", STYLE),
        (!local).then(|| action(".gitignore", GITIGNORE)).flatten(),
        (!local).then(|| action(".npmignore", NPMIGNORE)).flatten(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use crate::declarative::PluginDefinition;
    use crate::manifest::PackageManifest;
    use std::sync::Arc;

    async fn scaffold(args: &[&str], answers: Vec<Value>) -> (tempfile::TempDir, Arc<FakePackages>) {
        let dir = tempfile::tempdir().unwrap();
        let packages = Arc::new(FakePackages::default());
        let api = api(
            dir.path(),
            services(
                Arc::new(ScriptedPrompter::with_answers(answers)),
                Arc::new(FakeFormatter::default()),
                packages.clone(),
            ),
        );
        ScaffoldPlugin.install(&api).unwrap();
        let command = api.take_staged().remove(0);

        let mut argv = vec!["plugin"];
        argv.extend_from_slice(args);
        let matches = command.to_clap().try_get_matches_from(argv).unwrap();
        command
            .handler
            .run(&api, command.input(&matches))
            .await
            .unwrap();
        (dir, packages)
    }

    #[tokio::test]
    async fn test_scaffold_published_plugin() {
        let (dir, packages) = scaffold(
            &["--registry", "https://registry.example.com"],
            vec![json!("widget"), json!("Widget generator")],
        )
        .await;
        let root = dir.path().join("merry-plugin-widget");

        let manifest = PackageManifest::read(&root.join("package.json")).unwrap();
        assert_eq!(manifest.name, "merry-plugin-widget");
        assert_eq!(manifest.description, "Widget generator");
        assert_eq!(manifest.main.as_deref(), Some("plugin.yaml"));

        let definition = PluginDefinition::read(&root.join("plugin.yaml")).unwrap();
        assert_eq!(definition.commands[0].command, "widget [name]");
        assert_eq!(
            definition.commands[0].prompts[0].default,
            Some(json!("{{ name }}"))
        );

        let component = std::fs::read_to_string(root.join("templates/component.j2")).unwrap();
        assert!(component.contains("{{ name | pascal_case }}"));
        assert!(root.join(".gitignore").is_file());
        assert!(root.join(".npmignore").is_file());

        let calls = packages.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "link");
        assert_eq!(calls[0].1, root);
        assert_eq!(calls[0].2, vec!["--registry=https://registry.example.com"]);
    }

    #[tokio::test]
    async fn test_scaffold_local_plugin() {
        let (dir, packages) = scaffold(&["foo", "--local"], vec![json!("foo"), json!("")]).await;
        let root = dir.path().join("plugins/merry-plugin-foo");

        assert!(root.join("plugin.yaml").is_file());
        assert!(!root.join(".gitignore").exists());
        assert!(packages.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_link() {
        let (_dir, packages) = scaffold(&["--no-link"], vec![json!("bar"), json!("")]).await;
        assert!(packages.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quotes_in_answers_stay_valid() {
        let (dir, _packages) = scaffold(
            &["--no-link"],
            vec![json!("widget"), json!("The \"best\" widget: fast")],
        )
        .await;
        let root = dir.path().join("merry-plugin-widget");

        let manifest = PackageManifest::read(&root.join("package.json")).unwrap();
        assert_eq!(manifest.description, "The \"best\" widget: fast");
        assert_eq!(manifest.engine("merry"), Some(format!("^{}", CLI_VERSION).as_str()));

        let definition = PluginDefinition::read(&root.join("plugin.yaml")).unwrap();
        assert_eq!(
            definition.commands[0].description.as_deref(),
            Some("The \"best\" widget: fast")
        );
    }
}
