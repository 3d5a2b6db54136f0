//! Application wiring: configuration, plugin loading and dispatch

use crate::api::Services;
use crate::config::{get_config, Config};
use crate::dispatcher::{parse_args, Dispatcher};
use crate::loader::{LoadReport, Outcome, PluginLoader};
use crate::version::CLI_VERSION;
use crate::welcome;
use anyhow::Result;
use clap::{Arg, ArgMatches};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

pub const NAME: &str = "merry";
pub const DESCRIPTION: &str = "A plugin-driven scaffolding tool";

/// Sub-command available when debug mode is on
pub const DEBUG_COMMAND: &str = "debug";

pub struct App {
    dispatcher: Dispatcher,
    loader: PluginLoader,
    debug: bool,
}

impl App {
    /// App for the running process: cwd, process configuration, terminal services
    pub fn new(debug: bool) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_loader(
            PluginLoader::new(get_config(), Services::interactive(), cwd),
            debug,
        )
    }

    pub fn with_loader(loader: PluginLoader, debug: bool) -> Self {
        Self {
            dispatcher: Dispatcher::new(NAME, CLI_VERSION, DESCRIPTION),
            loader,
            debug,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        self.loader.config()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Load every plugin
    pub async fn install(&mut self) -> LoadReport {
        self.loader.install(&mut self.dispatcher).await
    }

    fn debug_available(&self) -> bool {
        self.debug && !self.dispatcher.contains(DEBUG_COMMAND)
    }

    fn cli(&self) -> clap::Command {
        let cli = self.dispatcher.cli();
        if !self.debug_available() {
            return cli;
        }
        cli.subcommand(
            clap::Command::new(DEBUG_COMMAND)
                .about("Load a single plugin and run one of its commands")
                .arg(
                    Arg::new("plugin")
                        .required(true)
                        .help("Plugin name, or a path to its folder"),
                )
                .arg(
                    Arg::new("args")
                        .num_args(0..)
                        .trailing_var_arg(true)
                        .allow_hyphen_values(true)
                        .help("Arguments passed to the plugin"),
                ),
        )
    }

    fn welcome(&self) -> Result<()> {
        welcome::print(DESCRIPTION, CLI_VERSION);
        self.cli().print_help()?;
        Ok(())
    }

    /// Parse `args` (program name first) and run the selected command
    pub async fn run<I, T>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        if args.len() <= 1 {
            return self.welcome();
        }

        let Some(matches) = parse_args(self.cli(), args)? else {
            return Ok(());
        };

        match matches.subcommand() {
            Some((DEBUG_COMMAND, sub)) if self.debug_available() => self.run_debug(sub).await,
            Some((name, sub)) => self.dispatcher.run(name, sub).await,
            None => self.welcome(),
        }
    }

    async fn run_debug(&mut self, matches: &ArgMatches) -> Result<()> {
        let Some(target) = matches.get_one::<String>("plugin") else {
            anyhow::bail!("a plugin name or path is required");
        };
        let rest: Vec<String> = matches
            .get_many::<String>("args")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let mut dispatcher = Dispatcher::new(target.clone(), CLI_VERSION, "debug");
        let entry = self.loader.load_debug(target, &mut dispatcher).await;
        match entry.outcome {
            Outcome::Loaded { commands } => {
                tracing::debug!(plugin = %target, ?commands, "debug plugin loaded");
            }
            Outcome::Skipped { reason } => anyhow::bail!("can not load {}: {}", target, reason),
            Outcome::Failed { error } => anyhow::bail!("can not load {}: {}", target, error),
        }

        let mut argv = vec![target.clone()];
        argv.extend(rest);
        dispatcher.dispatch(argv).await?;
        Ok(())
    }
}
