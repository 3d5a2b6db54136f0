//! Turning a plugin package into something that can be installed
//!
//! Resolvers are asked in order; the first one that recognizes the package
//! decides. A package nobody recognizes is not a plugin.

use crate::api::PluginPackage;
use crate::declarative::DeclarativePlugin;
use crate::plugin::Plugin;
use std::path::PathBuf;
use std::sync::Arc;

/// Entry point used when the manifest has no `main`
pub const DEFAULT_ENTRY: &str = "plugin.yaml";
const FALLBACK_ENTRY: &str = "plugin.yml";

pub enum Resolution {
    Plugin(Arc<dyn Plugin>),
    /// Recognized, but not something that can be installed
    NotCallable(String),
    /// Not for this resolver
    Unhandled,
}

pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, package: &PluginPackage) -> Resolution;
}

/// Plugins compiled into the binary, looked up by package name
#[derive(Default)]
pub struct BuiltinModules {
    modules: Vec<(String, Arc<dyn Plugin>)>,
}

impl BuiltinModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, plugin: impl Plugin + 'static) -> Self {
        self.modules.push((name.into(), Arc::new(plugin)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|(name, _)| name.as_str())
    }
}

impl ModuleResolver for BuiltinModules {
    fn resolve(&self, package: &PluginPackage) -> Resolution {
        if package.manifest_path.is_some() {
            return Resolution::Unhandled;
        }
        self.modules
            .iter()
            .find(|(name, _)| *name == package.manifest.name)
            .map(|(_, plugin)| Resolution::Plugin(plugin.clone()))
            .unwrap_or(Resolution::Unhandled)
    }
}

/// Packages whose entry point is a YAML plugin definition
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeModules;

impl DeclarativeModules {
    fn entry_point(package: &PluginPackage) -> Result<PathBuf, String> {
        match package.manifest.main.as_deref().filter(|m| !m.is_empty()) {
            Some(main) => {
                let path = package.dir.join(main);
                let is_yaml = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "yaml" || e == "yml");
                if !is_yaml {
                    return Err(format!("entry point {} is not a plugin definition", main));
                }
                if !path.is_file() {
                    return Err(format!("entry point {} does not exist", main));
                }
                Ok(path)
            }
            None => [DEFAULT_ENTRY, FALLBACK_ENTRY]
                .iter()
                .map(|entry| package.dir.join(entry))
                .find(|path| path.is_file())
                .ok_or_else(|| format!("no {} entry point", DEFAULT_ENTRY)),
        }
    }
}

impl ModuleResolver for DeclarativeModules {
    fn resolve(&self, package: &PluginPackage) -> Resolution {
        if package.manifest_path.is_none() {
            return Resolution::Unhandled;
        }
        match Self::entry_point(package) {
            Ok(path) => Resolution::Plugin(Arc::new(DeclarativePlugin::new(path))),
            Err(reason) => Resolution::NotCallable(reason),
        }
    }
}

/// Ask `resolvers` in order
pub fn resolve(resolvers: &[Box<dyn ModuleResolver>], package: &PluginPackage) -> Resolution {
    for resolver in resolvers {
        match resolver.resolve(package) {
            Resolution::Unhandled => continue,
            decided => return decided,
        }
    }
    Resolution::NotCallable(format!("{} has no recognized entry point", package.manifest.name))
}
