//! The surface handed to every plugin
//!
//! A [`PluginApi`] is created per loaded plugin. It carries the shared
//! configuration, the plugin's own package, and the services used for
//! prompting, formatting and package management.

pub mod diff;
pub mod format;
pub mod pipeline;
pub mod prompt;
pub mod template;

pub use format::{Formatter, PrettierFormatter};
pub use pipeline::{Action, ActionReport, ActionResult, FormatSetting, PipelineError, WriteOutcome};
pub use prompt::{Choice, CliclackPrompter, ConflictChoice, Prompter, Question, QuestionKind};
pub use template::{CompileOptions, TemplateEngine, TemplateSource};

use crate::config::Config;
use crate::dispatcher::{CommandDefinition, CommandHandler, CommandSpec, CommandSpecError, OptionSpec};
use crate::logging::PluginLogger;
use crate::manifest::{ManifestError, PackageManifest};
use crate::npm::{Npm, PackageManager};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Interactive services shared by all plugins of a run
#[derive(Clone)]
pub struct Services {
    pub prompter: Arc<dyn Prompter>,
    pub formatter: Arc<dyn Formatter>,
    pub packages: Arc<dyn PackageManager>,
}

impl Services {
    /// Terminal prompts, prettier and npm
    pub fn interactive() -> Self {
        Self {
            prompter: Arc::new(CliclackPrompter),
            formatter: Arc::new(PrettierFormatter),
            packages: Arc::new(Npm),
        }
    }
}

/// A plugin package on disk (or compiled in)
#[derive(Debug, Clone)]
pub struct PluginPackage {
    pub manifest: PackageManifest,
    /// `None` for bundled plugins
    pub manifest_path: Option<PathBuf>,
    /// Folder relative template paths resolve against
    pub dir: PathBuf,
}

impl PluginPackage {
    /// Read the package owning `manifest_path`
    pub fn read(manifest_path: &Path) -> Result<Self, ManifestError> {
        let manifest = PackageManifest::read(manifest_path)?;
        let dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            manifest,
            manifest_path: Some(manifest_path.to_path_buf()),
            dir,
        })
    }

    /// A package compiled into the binary
    pub fn bundled(name: &str, description: &str, dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest: PackageManifest {
                name: name.to_string(),
                version: crate::version::CLI_VERSION.to_string(),
                description: description.to_string(),
                ..PackageManifest::default()
            },
            manifest_path: None,
            dir: dir.into(),
        }
    }
}

struct ApiInner {
    config: Arc<Config>,
    package: PluginPackage,
    project_dir: PathBuf,
    services: Services,
    templates: TemplateEngine,
    logger: PluginLogger,
    staged: Mutex<Vec<CommandDefinition>>,
}

/// API instance of one plugin; cheap to clone
#[derive(Clone)]
pub struct PluginApi {
    inner: Arc<ApiInner>,
}

impl std::fmt::Debug for PluginApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginApi")
            .field("plugin", &self.inner.package.manifest.name)
            .field("project_dir", &self.inner.project_dir)
            .finish_non_exhaustive()
    }
}

impl PluginApi {
    pub fn new(
        config: Arc<Config>,
        services: Services,
        project_dir: impl Into<PathBuf>,
        package: PluginPackage,
    ) -> Self {
        let logger = PluginLogger::for_package(&package.manifest.name, &config.prefix);
        Self {
            inner: Arc::new(ApiInner {
                config,
                package,
                project_dir: project_dir.into(),
                services,
                templates: TemplateEngine::new(),
                logger,
                staged: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Name of the plugin package
    pub fn name(&self) -> &str {
        &self.inner.package.manifest.name
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.inner.package.manifest
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        self.inner.package.manifest_path.as_deref()
    }

    /// The plugin's own folder
    pub fn plugin_dir(&self) -> &Path {
        &self.inner.package.dir
    }

    /// The folder the CLI was invoked in
    pub fn project_dir(&self) -> &Path {
        &self.inner.project_dir
    }

    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    pub fn logger(&self) -> &PluginLogger {
        &self.inner.logger
    }

    pub fn log(&self, message: impl Display) {
        self.inner.logger.log(message);
    }

    /// Logger with a custom namespace
    pub fn logger_for(&self, namespace: impl Into<String>) -> PluginLogger {
        PluginLogger::new(namespace)
    }

    /// Start declaring a command, e.g. `api.command("new [name]")`
    ///
    /// Version and description default to the plugin's manifest.
    pub fn command(&self, spec: impl Into<String>) -> CommandBuilder<'_> {
        CommandBuilder {
            api: self,
            spec: spec.into(),
            description: self.manifest().description.clone(),
            version: self.manifest().version.clone(),
            options: Vec::new(),
        }
    }

    /// Commands declared so far, leaving the staging list empty
    pub(crate) fn take_staged(&self) -> Vec<CommandDefinition> {
        let mut staged = self
            .inner
            .staged
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *staged)
    }

    fn stage(&self, definition: CommandDefinition) {
        self.inner
            .staged
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(definition);
    }

    /// Relative paths resolve against the project directory
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.inner.project_dir.join(path)
        }
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> std::io::Result<String> {
        std::fs::read_to_string(self.resolve(path))
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path).exists()
    }

    /// Write a file, creating parent folders; never prompts
    pub fn write_file(&self, path: impl AsRef<Path>, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.resolve(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        self.log(format!("write file {} success", path.display()));
        Ok(path)
    }

    pub fn npm(&self) -> &dyn PackageManager {
        self.inner.services.packages.as_ref()
    }

    /// Render a template; file sources resolve against the plugin folder
    pub fn compile<S: Serialize + ?Sized>(
        &self,
        source: &TemplateSource,
        data: &S,
        options: CompileOptions,
    ) -> Result<String, PipelineError> {
        let text = source
            .load(self.plugin_dir())
            .map_err(|e| PipelineError::TemplateRead {
                source_name: format!("{:?}", source),
                source: e,
            })?;
        Ok(self.inner.templates.render(&text, data, options)?)
    }

    /// Ask each question in order; answers are keyed by question name
    pub fn prompt(&self, questions: &[Question]) -> std::io::Result<Map<String, Value>> {
        let mut answers = Map::new();
        for question in questions {
            let answer = self.inner.services.prompter.ask(question)?;
            answers.insert(question.name.clone(), answer);
        }
        Ok(answers)
    }

    /// `name` with the plugin prefix, e.g. `merry-plugin-<name>`
    pub fn pretty_name(&self, name: &str) -> String {
        format!("{}{}", self.config().prefix, name)
    }
}

/// A command being declared; [`CommandBuilder::action`] stages it
#[must_use = "a command is only registered once `action` is called"]
pub struct CommandBuilder<'a> {
    api: &'a PluginApi,
    spec: String,
    description: String,
    version: String,
    options: Vec<(String, String, Option<Value>)>,
}

impl CommandBuilder<'_> {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add an option, e.g. `.option("-T, --template [template]", "...")`
    pub fn option(mut self, flags: impl Into<String>, description: impl Into<String>) -> Self {
        self.options.push((flags.into(), description.into(), None));
        self
    }

    pub fn option_with_default(
        mut self,
        flags: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.options
            .push((flags.into(), description.into(), Some(default.into())));
        self
    }

    /// Validate the declaration without staging it
    pub fn build(self, handler: Arc<dyn CommandHandler>) -> Result<CommandDefinition, CommandSpecError> {
        let spec = CommandSpec::parse(&self.spec)?;
        let options = self
            .options
            .iter()
            .map(|(flags, description, default)| {
                let mut option = OptionSpec::parse(flags, description)?;
                if default.is_some() {
                    option.default = default.clone();
                }
                Ok(option)
            })
            .collect::<Result<Vec<_>, CommandSpecError>>()?;

        let definition = CommandDefinition {
            spec,
            description: self.description,
            version: self.version,
            options,
            handler,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Stage the command with its handler
    pub fn action<H: CommandHandler + 'static>(self, handler: H) -> Result<(), CommandSpecError> {
        self.action_arc(Arc::new(handler))
    }

    pub fn action_arc(self, handler: Arc<dyn CommandHandler>) -> Result<(), CommandSpecError> {
        let api = self.api;
        let definition = self.build(handler)?;
        tracing::debug!(plugin = %api.name(), command = %definition.name(), "command staged");
        api.stage(definition);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted stand-ins for the interactive services

    use super::*;
    use crate::api::format::FormatError;
    use crate::npm::NpmError;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Answers questions and conflicts from queues
    #[derive(Default)]
    pub struct ScriptedPrompter {
        pub answers: Mutex<VecDeque<Value>>,
        pub conflicts: Mutex<VecDeque<ConflictChoice>>,
        pub asked: Mutex<Vec<Question>>,
    }

    impl ScriptedPrompter {
        pub fn with_answers(answers: Vec<Value>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                ..Self::default()
            }
        }

        pub fn with_conflicts(conflicts: Vec<ConflictChoice>) -> Self {
            Self {
                conflicts: Mutex::new(conflicts.into()),
                ..Self::default()
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn ask(&self, question: &Question) -> std::io::Result<Value> {
            self.asked.lock().unwrap().push(question.clone());
            match self.answers.lock().unwrap().pop_front() {
                Some(answer) => Ok(answer),
                None => Ok(question.default.clone().unwrap_or(Value::Null)),
            }
        }

        fn resolve_conflict(&self, _path: &Path) -> std::io::Result<ConflictChoice> {
            self.conflicts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| std::io::Error::other("no scripted conflict answer"))
        }
    }

    /// Upper-cases the source and remembers the options it saw
    #[derive(Default)]
    pub struct FakeFormatter {
        pub seen: Mutex<Vec<Map<String, Value>>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Formatter for FakeFormatter {
        async fn format(
            &self,
            source: &str,
            _filepath: &Path,
            options: &Map<String, Value>,
        ) -> Result<String, FormatError> {
            self.seen.lock().unwrap().push(options.clone());
            if self.fail {
                return Err(FormatError::Failed {
                    code: 2,
                    stderr: "SyntaxError".to_string(),
                });
            }
            Ok(source.to_uppercase())
        }
    }

    /// Records calls instead of running npm
    #[derive(Default)]
    pub struct FakePackages {
        pub calls: Mutex<Vec<(String, PathBuf, Vec<String>)>>,
        pub roots: Vec<PathBuf>,
    }

    #[async_trait]
    impl PackageManager for FakePackages {
        async fn install(&self, dir: &Path, args: &[String]) -> Result<(), NpmError> {
            self.calls
                .lock()
                .unwrap()
                .push(("install".to_string(), dir.to_path_buf(), args.to_vec()));
            Ok(())
        }

        async fn link(&self, dir: &Path, args: &[String]) -> Result<(), NpmError> {
            self.calls
                .lock()
                .unwrap()
                .push(("link".to_string(), dir.to_path_buf(), args.to_vec()));
            Ok(())
        }

        async fn global_roots(&self) -> Vec<PathBuf> {
            self.roots.clone()
        }
    }

    pub fn services(
        prompter: Arc<ScriptedPrompter>,
        formatter: Arc<FakeFormatter>,
        packages: Arc<FakePackages>,
    ) -> Services {
        Services {
            prompter,
            formatter,
            packages,
        }
    }

    /// An API for a plugin named `merry-plugin-test` rooted at `project_dir`
    pub fn api(project_dir: &Path, services: Services) -> PluginApi {
        let package = PluginPackage::bundled("merry-plugin-test", "Test plugin", project_dir);
        PluginApi::new(Arc::new(Config::default()), services, project_dir, package)
    }

    pub fn quiet_api(project_dir: &Path) -> PluginApi {
        api(
            project_dir,
            services(
                Arc::new(ScriptedPrompter::default()),
                Arc::new(FakeFormatter::default()),
                Arc::new(FakePackages::default()),
            ),
        )
    }
}
