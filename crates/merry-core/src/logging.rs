//! Logging setup and the per-plugin logger
//!
//! Internal events use the crate targets and stay quiet unless `DEBUG` is
//! set. Plugin events go to the `plugin` target, which is always enabled.

use std::ffi::OsStr;
use std::fmt::Display;
use tracing_subscriber::EnvFilter;

/// Target used for every plugin log event
pub const PLUGIN_TARGET: &str = "plugin";

/// Environment variable enabling verbose logging and the debug command
pub const DEBUG_ENV: &str = "DEBUG";

/// Whether debug mode is requested by the environment
pub fn debug_enabled() -> bool {
    is_debug_value(std::env::var_os(DEBUG_ENV).as_deref())
}

/// Any non-empty value turns debug mode on, `DEBUG=0` included
fn is_debug_value(value: Option<&OsStr>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Build the log filter; `RUST_LOG` wins over the defaults
pub fn filter(debug: bool) -> EnvFilter {
    let base = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if debug {
            "warn,merry=debug,merry_core=debug".to_string()
        } else {
            "warn".to_string()
        }
    });

    let filter = EnvFilter::try_new(&base).unwrap_or_else(|_| EnvFilter::new("warn"));
    match format!("{}=trace", PLUGIN_TARGET).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Install the global subscriber (stderr, no timestamps)
pub fn init(debug: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(debug))
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Logger handed to plugins, namespaced `plugin:<name>`
#[derive(Debug, Clone)]
pub struct PluginLogger {
    namespace: String,
}

impl PluginLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Logger for a package, with the plugin prefix stripped from its name
    pub fn for_package(package_name: &str, prefix: &str) -> Self {
        Self::new(format!(
            "{}:{}",
            PLUGIN_TARGET,
            package_name.replace(prefix, "")
        ))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn log(&self, message: impl Display) {
        tracing::info!(target: PLUGIN_TARGET, namespace = %self.namespace, "{}", message);
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!(target: PLUGIN_TARGET, namespace = %self.namespace, "{}", message);
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!(target: PLUGIN_TARGET, namespace = %self.namespace, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_strips_prefix() {
        let logger = PluginLogger::for_package("merry-plugin-component", "merry-plugin-");
        assert_eq!(logger.namespace(), "plugin:component");
    }

    #[test]
    fn test_scoped_namespace() {
        let logger = PluginLogger::for_package("@acme/merry-plugin-api", "merry-plugin-");
        assert_eq!(logger.namespace(), "plugin:@acme/api");
    }

    #[test]
    fn test_plugin_target_always_enabled() {
        let filter = filter(false).to_string();
        assert!(filter.contains("plugin=trace"));
    }

    #[test]
    fn test_any_non_empty_debug_value_enables() {
        assert!(is_debug_value(Some(OsStr::new("1"))));
        assert!(is_debug_value(Some(OsStr::new("0"))));
        assert!(is_debug_value(Some(OsStr::new("false"))));
        assert!(!is_debug_value(Some(OsStr::new(""))));
        assert!(!is_debug_value(None));
    }
}
