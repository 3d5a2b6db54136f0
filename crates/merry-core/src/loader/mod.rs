//! Plugin discovery and installation
//!
//! Plugins are loaded in four phases: bundled plugins, the project's local
//! plugin folder, plugins declared as project dependencies, and globally
//! installed packages. A plugin id is skipped once it has loaded, and a
//! package is never installed twice.

pub mod discover;
pub mod report;
pub mod resolve;

pub use report::{LoadEntry, LoadReport, Outcome, Source};
pub use resolve::{BuiltinModules, DeclarativeModules, ModuleResolver, Resolution};

use crate::api::{PluginApi, PluginPackage, Services};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::manifest::{find_up, resolve_package, ManifestError, MANIFEST_FILE};
use crate::plugin::PluginError;
use crate::{bundled, npm, version};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no {MANIFEST_FILE} found for {0}")]
    ManifestNotFound(String),

    #[error("{0} is already loaded")]
    AlreadyLoaded(String),

    #[error("{0} was already attempted from {1}")]
    AlreadyAttempted(String, String),

    #[error("can not find {0}, make sure you have installed it already")]
    NotInstalled(String),

    #[error("{id} is not a plugin: {reason}")]
    NotCallable { id: String, reason: String },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("plugin {id} failed to install: {source}")]
    Install { id: String, source: PluginError },

    #[error("plugin {0} panicked during install")]
    Panicked(String),
}

impl LoadError {
    /// Whether the plugin was never invoked
    fn is_skip(&self) -> bool {
        matches!(
            self,
            LoadError::ManifestNotFound(_)
                | LoadError::AlreadyLoaded(_)
                | LoadError::AlreadyAttempted(..)
                | LoadError::NotInstalled(_)
                | LoadError::NotCallable { .. }
        )
    }
}

/// Where a candidate lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Bundled { description: String },
    Path(PathBuf),
}

/// Something that may be a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub source: Source,
    pub location: Location,
}

impl Candidate {
    pub fn bundled(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: Source::Bundled,
            location: Location::Bundled {
                description: description.into(),
            },
        }
    }

    pub fn at(id: impl Into<String>, source: Source, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source,
            location: Location::Path(path.into()),
        }
    }
}

pub struct PluginLoader {
    config: Arc<Config>,
    services: Services,
    project_dir: PathBuf,
    resolvers: Vec<Box<dyn ModuleResolver>>,
    bundled: Vec<Candidate>,
    /// Ids that installed successfully
    loaded: HashSet<String>,
    /// Packages whose `install` was invoked, by manifest path or bundled id
    invoked: HashSet<PathBuf>,
}

impl PluginLoader {
    /// Loader with the bundled and declarative resolvers
    pub fn new(config: Arc<Config>, services: Services, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            services,
            project_dir: project_dir.into(),
            resolvers: vec![Box::new(bundled::modules()), Box::new(DeclarativeModules)],
            bundled: bundled::candidates(),
            loaded: HashSet::new(),
            invoked: HashSet::new(),
        }
    }

    /// Replace the resolvers and the bundled candidates
    pub fn with_modules(
        mut self,
        resolvers: Vec<Box<dyn ModuleResolver>>,
        bundled: Vec<Candidate>,
    ) -> Self {
        self.resolvers = resolvers;
        self.bundled = bundled;
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Run all four discovery phases
    pub async fn install(&mut self, dispatcher: &mut Dispatcher) -> LoadReport {
        let mut report = LoadReport::default();

        for candidate in self.bundled.clone() {
            report.push(self.load_candidate(&candidate, dispatcher).await);
        }

        let local_dir = self.project_dir.join(&self.config.plugin_dir);
        for found in discover::scan(&local_dir, &self.config, false) {
            let candidate = Candidate::at(found.id, Source::Local, found.path);
            report.push(self.load_candidate(&candidate, dispatcher).await);
        }

        for declared in discover::declared(&self.project_dir, &self.config) {
            let entry = match declared.path {
                Some(path) => {
                    let candidate = Candidate::at(declared.name, Source::Dependency, path);
                    self.load_candidate(&candidate, dispatcher).await
                }
                None => {
                    let error = LoadError::NotInstalled(declared.name.clone());
                    println!("{}", error);
                    Self::entry(declared.name, Source::Dependency, Err(error))
                }
            };
            report.push(entry);
        }

        for root in self.services.packages.global_roots().await {
            for found in discover::scan(&root, &self.config, true) {
                let candidate = Candidate::at(found.id, Source::Global, found.path);
                report.push(self.load_candidate(&candidate, dispatcher).await);
            }
        }

        tracing::debug!(%report, "plugins loaded");
        report
    }

    /// Load one candidate unless a plugin with the same id already loaded
    pub async fn load_candidate(
        &mut self,
        candidate: &Candidate,
        dispatcher: &mut Dispatcher,
    ) -> LoadEntry {
        let result = self.try_load(candidate, dispatcher, true).await;
        Self::entry(candidate.id.clone(), candidate.source, result)
    }

    /// Load a plugin for the `debug` command, by name or by path.
    /// The loaded set is neither consulted nor updated.
    pub async fn load_debug(&mut self, target: &str, dispatcher: &mut Dispatcher) -> LoadEntry {
        let candidate = match self.bundled.iter().find(|c| c.id == target) {
            Some(bundled) => Candidate {
                source: Source::Debug,
                ..bundled.clone()
            },
            None => Candidate::at(target, Source::Debug, self.locate(target).await),
        };
        let result = self.try_load(&candidate, dispatcher, false).await;
        Self::entry(candidate.id, Source::Debug, result)
    }

    /// Folder of a plugin given on the command line
    async fn locate(&self, target: &str) -> PathBuf {
        let path = Path::new(target);
        if path.is_absolute() || !self.config.is_plugin_name(target) {
            return self.project_dir.join(path);
        }

        if let Some(found) = resolve_package(&self.project_dir, target) {
            return found;
        }
        let local = self.project_dir.join(&self.config.plugin_dir).join(target);
        if local.is_dir() {
            return local;
        }
        for root in self.services.packages.global_roots().await {
            let global = root.join(target);
            if global.is_dir() {
                return global;
            }
        }
        self.project_dir.join(path)
    }

    fn entry(id: String, source: Source, result: Result<Vec<String>, LoadError>) -> LoadEntry {
        let outcome = match result {
            Ok(commands) => {
                tracing::debug!(plugin = %id, %source, ?commands, "plugin loaded");
                Outcome::Loaded { commands }
            }
            Err(e) if e.is_skip() => {
                match &e {
                    LoadError::NotCallable { .. } => tracing::warn!(plugin = %id, "{}", e),
                    _ => tracing::debug!(plugin = %id, reason = %e, "plugin skipped"),
                }
                Outcome::Skipped {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                tracing::error!(plugin = %id, %source, error = %e, "plugin failed");
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        LoadEntry { id, source, outcome }
    }

    async fn try_load(
        &mut self,
        candidate: &Candidate,
        dispatcher: &mut Dispatcher,
        dedup: bool,
    ) -> Result<Vec<String>, LoadError> {
        let package = match &candidate.location {
            Location::Bundled { description } => {
                PluginPackage::bundled(&candidate.id, description, &self.project_dir)
            }
            Location::Path(dir) => {
                if !dir.is_dir() {
                    return Err(LoadError::ManifestNotFound(candidate.id.clone()));
                }
                let manifest_path = find_up(dir, MANIFEST_FILE)
                    .ok_or_else(|| LoadError::ManifestNotFound(candidate.id.clone()))?;
                let package = PluginPackage::read(&manifest_path)?;
                if candidate.source == Source::Local {
                    npm::ensure_dependencies(
                        self.services.packages.as_ref(),
                        &package.dir,
                        &package.manifest,
                    )
                    .await;
                }
                package
            }
        };

        if dedup && self.loaded.contains(&candidate.id) {
            return Err(LoadError::AlreadyLoaded(candidate.id.clone()));
        }
        let key = package
            .manifest_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&candidate.id));
        if dedup && self.invoked.contains(&key) {
            return Err(LoadError::AlreadyAttempted(
                candidate.id.clone(),
                key.display().to_string(),
            ));
        }

        let plugin = match resolve::resolve(&self.resolvers, &package) {
            Resolution::Plugin(plugin) => plugin,
            Resolution::NotCallable(reason) => {
                return Err(LoadError::NotCallable {
                    id: candidate.id.clone(),
                    reason,
                })
            }
            Resolution::Unhandled => {
                return Err(LoadError::NotCallable {
                    id: candidate.id.clone(),
                    reason: "no resolver recognized it".to_string(),
                })
            }
        };

        if let Some(requirement) = package.manifest.engine(&self.config.namespace) {
            if let Some(warning) =
                version::check_compatibility(version::CLI_VERSION, &candidate.id, requirement)
            {
                tracing::warn!(plugin = %candidate.id, "{}", warning);
            }
        }

        let api = PluginApi::new(
            self.config.clone(),
            self.services.clone(),
            self.project_dir.clone(),
            package,
        );

        if dedup {
            self.invoked.insert(key);
        }
        match std::panic::catch_unwind(AssertUnwindSafe(|| plugin.install(&api))) {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(LoadError::Install {
                    id: candidate.id.clone(),
                    source,
                })
            }
            Err(_) => return Err(LoadError::Panicked(candidate.id.clone())),
        }

        let mut commands = Vec::new();
        for definition in api.take_staged() {
            let name = definition.name().to_string();
            match dispatcher.register(&candidate.id, api.clone(), definition) {
                Ok(()) => commands.push(name),
                Err(e) => tracing::warn!(plugin = %candidate.id, "{}", e),
            }
        }
        if dedup {
            self.loaded.insert(candidate.id.clone());
        }
        Ok(commands)
    }
}
