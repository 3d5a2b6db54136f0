//! Merry Core - plugin loading and template-driven code generation
//!
//! The `merry` binary is a thin shell around this library. Everything it can
//! do comes from plugins: bundled ones compiled into the binary, and plugin
//! packages found in the project, its dependencies, or the global package
//! folders.
//!
//! # Architecture
//!
//! - **Configuration** (`config`): resolved once per process from the project
//!   manifest, rc files and the environment
//! - **Loader** (`loader`): four-phase discovery, entry point resolution and a
//!   per-plugin [`LoadReport`]
//! - **Plugin API** (`api`): what each plugin receives; commands, file I/O,
//!   templates, prompts and the render/format/write pipeline
//! - **Dispatcher** (`dispatcher`): the shared command registry, parsed once
//!   after every plugin is loaded
//!
//! # Example
//!
//! ```ignore
//! use merry_core::{App, logging};
//!
//! logging::init(logging::debug_enabled());
//! let mut app = App::new(logging::debug_enabled());
//! app.install().await;
//! app.run(std::env::args_os()).await?;
//! ```

pub mod api;
pub mod app;
pub mod archive;
pub mod bundled;
pub mod config;
pub mod declarative;
pub mod dispatcher;
pub mod loader;
pub mod logging;
pub mod manifest;
pub mod npm;
pub mod plugin;
pub mod version;
pub mod welcome;

pub use api::{Action, FormatSetting, PluginApi, PluginPackage, Services, WriteOutcome};
pub use app::App;
pub use config::{get_config, Config, ConfigSources};
pub use dispatcher::{CommandHandler, CommandInput, Dispatcher};
pub use loader::{Candidate, LoadReport, PluginLoader};
pub use plugin::{Plugin, PluginError};
pub use version::CLI_VERSION;
