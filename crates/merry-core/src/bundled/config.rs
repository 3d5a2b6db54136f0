//! `config`: print or change the project configuration

use crate::api::PluginApi;
use crate::dispatcher::{CommandHandler, CommandInput};
use crate::manifest::MANIFEST_FILE;
use crate::plugin::{Plugin, PluginError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use serde_json::{Map, Value};
use std::path::Path;

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn install(&self, api: &PluginApi) -> Result<(), PluginError> {
        api.command("config")
            .option("-L, --list", "list configurations")
            .option("-D, --dist [dist]", "change dist folder")
            .option("-P, --plugin-dir [pluginDir]", "change plugin dir")
            .action(ConfigCommand)?;
        Ok(())
    }
}

struct ConfigCommand;

#[async_trait]
impl CommandHandler for ConfigCommand {
    async fn run(&self, api: &PluginApi, input: CommandInput) -> Result<()> {
        if input.flag("list") {
            let json = serde_json::to_string_pretty(api.config())?;
            println!("{}", json.bright_green());
        }

        let dist = input.get_str("dist");
        let plugin_dir = input.get_str("pluginDir");
        if dist.is_some() || plugin_dir.is_some() {
            let manifest = api.project_dir().join(MANIFEST_FILE);
            if !manifest.is_file() {
                api.log(format!("{} not found", manifest.display()));
                return Ok(());
            }
            match update_manifest(&manifest, &api.config().namespace, dist, plugin_dir) {
                Ok(()) => println!("{}", "updated".green()),
                Err(e) => println!("{}", format!("Can not update package.json {:#}", e).red()),
            }
        }

        tracing::debug!(?input, "config options");
        Ok(())
    }
}

/// Set `dist`/`pluginDir` under the `namespace` key of a package manifest,
/// keeping every other key and their order
pub fn update_manifest(
    path: &Path,
    namespace: &str,
    dist: Option<&str>,
    plugin_dir: Option<&str>,
) -> Result<()> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut manifest: Value =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?;

    let root = manifest
        .as_object_mut()
        .context("package.json is not an object")?;
    let section = root
        .entry(namespace)
        .or_insert_with(|| Value::Object(Map::new()));
    if !section.is_object() {
        *section = Value::Object(Map::new());
    }
    let Some(section) = section.as_object_mut() else {
        anyhow::bail!("{} is not an object", namespace);
    };

    if let Some(dist) = dist {
        section.insert("dist".to_string(), Value::String(dist.to_string()));
    }
    if let Some(plugin_dir) = plugin_dir {
        section.insert("pluginDir".to_string(), Value::String(plugin_dir.to_string()));
    }

    let mut output = serde_json::to_string_pretty(&manifest)?;
    output.push('\n');
    std::fs::write(path, output).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::quiet_api;
    use serde_json::json;

    #[test]
    fn test_update_keeps_other_keys_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(
            &path,
            r#"{"name":"app","version":"1.0.0","merry":{"custom":1},"scripts":{}}"#,
        )
        .unwrap();

        update_manifest(&path, "merry", Some("lib"), None).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["merry"], json!({ "custom": 1, "dist": "lib" }));
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "version", "merry", "scripts"]);
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_update_creates_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(&path, r#"{ "name": "app" }"#).unwrap();

        update_manifest(&path, "merry", None, Some("tools")).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["merry"], json!({ "pluginDir": "tools" }));
    }

    #[test]
    fn test_update_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(update_manifest(&path, "merry", Some("lib"), None).is_err());
    }

    #[tokio::test]
    async fn test_command_updates_project_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{ "name": "app" }"#).unwrap();
        let api = quiet_api(dir.path());
        ConfigPlugin.install(&api).unwrap();
        let command = api.take_staged().remove(0);

        let matches = command
            .to_clap()
            .try_get_matches_from(["config", "--dist", "lib"])
            .unwrap();
        command
            .handler
            .run(&api, command.input(&matches))
            .await
            .unwrap();

        let value: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("package.json")).unwrap())
                .unwrap();
        assert_eq!(value["merry"]["dist"], json!("lib"));
    }
}
