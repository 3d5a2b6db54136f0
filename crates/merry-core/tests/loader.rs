//! Plugin loading across the four discovery phases

use async_trait::async_trait;
use merry_core::api::format::FormatError;
use merry_core::api::{ConflictChoice, Formatter, Prompter, Question};
use merry_core::dispatcher::{CommandHandler, CommandInput};
use merry_core::loader::{
    BuiltinModules, Candidate, DeclarativeModules, ModuleResolver, Outcome, Source,
};
use merry_core::npm::{NpmError, PackageManager};
use merry_core::{Config, ConfigSources, Dispatcher, Plugin, PluginApi, PluginError, PluginLoader, Services};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct NoPrompts;

impl Prompter for NoPrompts {
    fn ask(&self, question: &Question) -> std::io::Result<Value> {
        Ok(question.default.clone().unwrap_or(Value::Null))
    }

    fn resolve_conflict(&self, _path: &Path) -> std::io::Result<ConflictChoice> {
        Ok(ConflictChoice::Abort)
    }
}

struct Identity;

#[async_trait]
impl Formatter for Identity {
    async fn format(
        &self,
        source: &str,
        _filepath: &Path,
        _options: &Map<String, Value>,
    ) -> Result<String, FormatError> {
        Ok(source.to_string())
    }
}

/// Never installs anything; global roots are fixed folders
#[derive(Default)]
struct FixedRoots {
    roots: Vec<PathBuf>,
}

#[async_trait]
impl PackageManager for FixedRoots {
    async fn install(&self, _dir: &Path, _args: &[String]) -> Result<(), NpmError> {
        Ok(())
    }

    async fn link(&self, _dir: &Path, _args: &[String]) -> Result<(), NpmError> {
        Ok(())
    }

    async fn global_roots(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }
}

fn services(roots: Vec<PathBuf>) -> Services {
    Services {
        prompter: Arc::new(NoPrompts),
        formatter: Arc::new(Identity),
        packages: Arc::new(FixedRoots { roots }),
    }
}

struct Noop;

#[async_trait]
impl CommandHandler for Noop {
    async fn run(&self, _api: &PluginApi, _input: CommandInput) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Registers `command` and counts its installs
struct Counting {
    command: &'static str,
    installs: Arc<AtomicUsize>,
}

impl Plugin for Counting {
    fn install(&self, api: &PluginApi) -> Result<(), PluginError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        api.command(self.command).action(Noop)?;
        Ok(())
    }
}

fn loader(dir: &Path, resolvers: Vec<Box<dyn ModuleResolver>>, bundled: Vec<Candidate>) -> PluginLoader {
    PluginLoader::new(Arc::new(Config::default()), services(Vec::new()), dir)
        .with_modules(resolvers, bundled)
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn declarative_package(dir: &Path, name: &str, command: &str) {
    write(
        &dir.join("package.json"),
        &json!({ "name": name, "version": "1.0.0", "main": "plugin.yaml" }).to_string(),
    );
    write(
        &dir.join("plugin.yaml"),
        &format!("commands:\n  - command: \"{}\"\n    description: test\n", command),
    );
}

#[tokio::test]
async fn test_same_plugin_is_installed_once() {
    let dir = tempfile::tempdir().unwrap();
    let installs = Arc::new(AtomicUsize::new(0));
    let modules = BuiltinModules::new().with(
        "merry-plugin-hello",
        Counting {
            command: "hello",
            installs: installs.clone(),
        },
    );
    let candidate = Candidate::bundled("merry-plugin-hello", "Hello");
    let mut loader = loader(dir.path(), vec![Box::new(modules)], vec![candidate.clone()]);
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");

    let first = loader.load_candidate(&candidate, &mut dispatcher).await;
    let second = loader.load_candidate(&candidate, &mut dispatcher).await;

    assert!(first.is_loaded());
    assert!(matches!(second.outcome, Outcome::Skipped { .. }));
    assert_eq!(installs.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.command_names(), vec!["hello"]);
}

/// Counts its installs and always fails
struct Broken {
    installs: Arc<AtomicUsize>,
}

impl Plugin for Broken {
    fn install(&self, _api: &PluginApi) -> Result<(), PluginError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        Err(PluginError::Other(anyhow::anyhow!("broken")))
    }
}

#[tokio::test]
async fn test_failed_plugin_is_not_invoked_again() {
    let dir = tempfile::tempdir().unwrap();
    let installs = Arc::new(AtomicUsize::new(0));
    let modules = BuiltinModules::new().with(
        "merry-plugin-broken",
        Broken {
            installs: installs.clone(),
        },
    );
    let candidate = Candidate::bundled("merry-plugin-broken", "");
    let mut loader = loader(dir.path(), vec![Box::new(modules)], Vec::new());
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");

    let first = loader.load_candidate(&candidate, &mut dispatcher).await;
    let second = loader.load_candidate(&candidate, &mut dispatcher).await;

    assert!(matches!(first.outcome, Outcome::Failed { .. }));
    assert!(matches!(second.outcome, Outcome::Skipped { .. }));
    assert_eq!(installs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_plugins_do_not_stop_others() {
    let dir = tempfile::tempdir().unwrap();
    let installs = Arc::new(AtomicUsize::new(0));
    let failing = |_: &PluginApi| -> Result<(), PluginError> {
        Err(PluginError::Other(anyhow::anyhow!("boom")))
    };
    let panicking = |_: &PluginApi| -> Result<(), PluginError> { panic!("install exploded") };
    let modules = BuiltinModules::new()
        .with("merry-plugin-fail", failing)
        .with("merry-plugin-panic", panicking)
        .with(
            "merry-plugin-ok",
            Counting {
                command: "ok",
                installs: installs.clone(),
            },
        );
    let bundled = vec![
        Candidate::bundled("merry-plugin-fail", ""),
        Candidate::bundled("merry-plugin-panic", ""),
        Candidate::bundled("merry-plugin-ok", ""),
    ];
    let mut loader = loader(dir.path(), vec![Box::new(modules)], bundled);
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");

    let report = loader.install(&mut dispatcher).await;

    assert_eq!(report.failed().count(), 2);
    assert!(report.is_loaded("merry-plugin-ok"));
    assert_eq!(installs.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.command_names(), vec!["ok"]);
}

#[tokio::test]
async fn test_failed_plugin_contributes_no_commands() {
    let dir = tempfile::tempdir().unwrap();
    let half_done = |api: &PluginApi| -> Result<(), PluginError> {
        api.command("early").action(Noop)?;
        Err(PluginError::Other(anyhow::anyhow!("gave up")))
    };
    let modules = BuiltinModules::new().with("merry-plugin-half", half_done);
    let mut loader = loader(
        dir.path(),
        vec![Box::new(modules)],
        vec![Candidate::bundled("merry-plugin-half", "")],
    );
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");

    let report = loader.install(&mut dispatcher).await;

    assert_eq!(report.failed().count(), 1);
    assert!(dispatcher.is_empty());
}

#[tokio::test]
async fn test_local_plugins_are_discovered() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    declarative_package(&plugins.join("merry-plugin-foo"), "merry-plugin-foo", "foo [name]");
    declarative_package(&plugins.join("not-a-plugin"), "not-a-plugin", "nope");

    let mut loader = loader(dir.path(), vec![Box::new(DeclarativeModules)], Vec::new());
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");
    let report = loader.install(&mut dispatcher).await;

    assert!(report.is_loaded("merry-plugin-foo"));
    assert!(report.get("not-a-plugin").is_none());
    assert_eq!(dispatcher.command_names(), vec!["foo"]);
}

#[tokio::test]
async fn test_non_callable_entry_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    let script = plugins.join("merry-plugin-js");
    write(
        &script.join("package.json"),
        &json!({ "name": "merry-plugin-js", "main": "index.js" }).to_string(),
    );
    write(&script.join("index.js"), "module.exports = {}\n");
    declarative_package(&plugins.join("merry-plugin-zoo"), "merry-plugin-zoo", "zoo");

    let mut loader = loader(dir.path(), vec![Box::new(DeclarativeModules)], Vec::new());
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");
    let report = loader.install(&mut dispatcher).await;

    let skipped = report.get("merry-plugin-js").unwrap();
    assert!(matches!(skipped.outcome, Outcome::Skipped { .. }));
    assert!(report.is_loaded("merry-plugin-zoo"));
    assert_eq!(dispatcher.command_names(), vec!["zoo"]);
}

#[tokio::test]
async fn test_declared_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("package.json"),
        &json!({
            "name": "app",
            "dependencies": { "merry-plugin-bar": "^1.0.0", "left-pad": "^1.0.0" },
            "devDependencies": { "merry-plugin-missing": "^1.0.0" }
        })
        .to_string(),
    );
    declarative_package(
        &dir.path().join("node_modules/merry-plugin-bar"),
        "merry-plugin-bar",
        "bar",
    );

    let mut loader = loader(dir.path(), vec![Box::new(DeclarativeModules)], Vec::new());
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");
    let report = loader.install(&mut dispatcher).await;

    assert!(report.is_loaded("merry-plugin-bar"));
    let missing = report.get("merry-plugin-missing").unwrap();
    assert!(matches!(missing.outcome, Outcome::Skipped { .. }));
    assert!(report.get("left-pad").is_none());
    assert_eq!(dispatcher.command_names(), vec!["bar"]);
}

#[tokio::test]
async fn test_debug_loads_plugin_by_path() {
    let dir = tempfile::tempdir().unwrap();
    declarative_package(&dir.path().join("work/merry-plugin-dev"), "merry-plugin-dev", "dev");

    let mut loader = loader(dir.path(), vec![Box::new(DeclarativeModules)], Vec::new());
    let mut dispatcher = Dispatcher::new("merry-plugin-dev", "1.0.0", "debug");
    let entry = loader.load_debug("work/merry-plugin-dev", &mut dispatcher).await;

    assert!(entry.is_loaded());
    assert_eq!(dispatcher.command_names(), vec!["dev"]);
}

#[test]
fn test_config_from_empty_project_key() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("package.json"),
        &json!({ "name": "app", "merry": {} }).to_string(),
    );

    let config = Config::resolve(&ConfigSources::project(dir.path()));

    assert_eq!(config.namespace, "merry");
    assert_eq!(config.prefix, "merry-plugin-");
    assert_eq!(config.dist, "src");
    assert_eq!(config.plugin_dir, "plugins");
}

#[tokio::test]
async fn test_unloadable_local_plugin_does_not_shadow_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("plugins/merry-plugin-foo");
    write(
        &local.join("package.json"),
        &json!({ "name": "merry-plugin-foo", "main": "index.js" }).to_string(),
    );
    write(&local.join("index.js"), "module.exports = {}\n");
    write(
        &dir.path().join("package.json"),
        &json!({ "name": "app", "dependencies": { "merry-plugin-foo": "^1.0.0" } }).to_string(),
    );
    declarative_package(
        &dir.path().join("node_modules/merry-plugin-foo"),
        "merry-plugin-foo",
        "foo",
    );

    let mut loader = loader(dir.path(), vec![Box::new(DeclarativeModules)], Vec::new());
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");
    let report = loader.install(&mut dispatcher).await;

    let entries = report.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].source, Source::Local);
    assert!(matches!(entries[0].outcome, Outcome::Skipped { .. }));
    assert_eq!(entries[1].source, Source::Dependency);
    assert!(entries[1].is_loaded());
    assert_eq!(dispatcher.command_names(), vec!["foo"]);
}

#[tokio::test]
async fn test_reserved_command_fails_only_its_plugin() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    declarative_package(&plugins.join("merry-plugin-bad"), "merry-plugin-bad", "help");
    declarative_package(&plugins.join("merry-plugin-good"), "merry-plugin-good", "good");

    let mut loader = loader(dir.path(), vec![Box::new(DeclarativeModules)], Vec::new());
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");
    let report = loader.install(&mut dispatcher).await;

    let bad = report.get("merry-plugin-bad").unwrap();
    assert!(matches!(bad.outcome, Outcome::Failed { .. }));
    assert!(report.is_loaded("merry-plugin-good"));

    dispatcher.dispatch(["merry", "good"]).await.unwrap();
}

#[tokio::test]
async fn test_phases_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("project");
    let global = dir.path().join("global");

    declarative_package(&project.join("plugins/merry-plugin-foo"), "merry-plugin-foo", "foo");
    write(
        &project.join("package.json"),
        &json!({ "name": "app", "dependencies": { "merry-plugin-bar": "^1.0.0" } }).to_string(),
    );
    declarative_package(
        &project.join("node_modules/merry-plugin-bar"),
        "merry-plugin-bar",
        "bar",
    );
    declarative_package(
        &global.join("@acme/merry-plugin-x"),
        "@acme/merry-plugin-x",
        "x",
    );
    declarative_package(&global.join("merry-plugin-foo"), "merry-plugin-foo", "foo-global");
    declarative_package(&global.join("left-pad"), "left-pad", "pad");

    let installs = Arc::new(AtomicUsize::new(0));
    let modules = BuiltinModules::new().with(
        "merry-plugin-core",
        Counting {
            command: "core",
            installs,
        },
    );
    let mut loader = PluginLoader::new(Arc::new(Config::default()), services(vec![global]), &project)
        .with_modules(
            vec![Box::new(modules), Box::new(DeclarativeModules)],
            vec![Candidate::bundled("merry-plugin-core", "Core")],
        );
    let mut dispatcher = Dispatcher::new("merry", "1.0.0", "test");
    let report = loader.install(&mut dispatcher).await;

    let order: Vec<(&str, Source)> = report
        .entries()
        .iter()
        .map(|e| (e.id.as_str(), e.source))
        .collect();
    assert_eq!(
        order,
        vec![
            ("merry-plugin-core", Source::Bundled),
            ("merry-plugin-foo", Source::Local),
            ("merry-plugin-bar", Source::Dependency),
            ("@acme/merry-plugin-x", Source::Global),
            ("merry-plugin-foo", Source::Global),
        ]
    );
    assert!(matches!(
        report.entries()[4].outcome,
        Outcome::Skipped { .. }
    ));
    assert_eq!(dispatcher.command_names(), vec!["core", "foo", "bar", "x"]);
}
