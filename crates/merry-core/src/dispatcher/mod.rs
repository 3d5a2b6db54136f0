//! The shared command registry
//!
//! Plugins register sub-commands while they are loaded; the process arguments
//! are parsed once, after every plugin had its turn.

pub mod command;

pub use command::{
    ArgSpec, CommandDefinition, CommandHandler, CommandInput, CommandSpec, CommandSpecError,
    OptionKind, OptionSpec,
};

use crate::api::PluginApi;
use clap::ArgMatches;
use std::ffi::OsString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("command '{command}' from {new_plugin} is already registered by {existing_plugin}")]
    CommandConflict {
        command: String,
        existing_plugin: String,
        new_plugin: String,
    },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("command '{command}' from {plugin} is invalid: {source}")]
    Invalid {
        command: String,
        plugin: String,
        source: CommandSpecError,
    },
}

/// What a dispatch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// No arguments were given, help was printed
    Help,
    /// clap printed help or version output for the given flags
    Displayed,
    /// The named command ran
    Command(String),
}

/// A command together with the plugin instance that registered it
pub struct RegisteredCommand {
    pub plugin: String,
    pub definition: CommandDefinition,
    api: PluginApi,
}

pub struct Dispatcher {
    name: String,
    version: String,
    about: String,
    commands: Vec<RegisteredCommand>,
}

impl Dispatcher {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        about: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            about: about.into(),
            commands: Vec::new(),
        }
    }

    /// Register a command; the first registration of a name wins
    pub fn register(
        &mut self,
        plugin: &str,
        api: PluginApi,
        definition: CommandDefinition,
    ) -> Result<(), DispatchError> {
        definition
            .validate()
            .map_err(|source| DispatchError::Invalid {
                command: definition.name().to_string(),
                plugin: plugin.to_string(),
                source,
            })?;
        if let Some(existing) = self.find(definition.name()) {
            return Err(DispatchError::CommandConflict {
                command: definition.name().to_string(),
                existing_plugin: existing.plugin.clone(),
                new_plugin: plugin.to_string(),
            });
        }

        tracing::debug!(plugin, command = %definition.name(), "command registered");
        self.commands.push(RegisteredCommand {
            plugin: plugin.to_string(),
            definition,
            api,
        });
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.iter().find(|c| c.definition.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Registered command names, in registration order
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.definition.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The root clap command with every registered sub-command
    pub fn cli(&self) -> clap::Command {
        let mut cli = clap::Command::new(self.name.clone())
            .version(self.version.clone())
            .about(self.about.clone());
        for registered in &self.commands {
            cli = cli.subcommand(registered.definition.to_clap());
        }
        cli
    }

    /// Run a parsed sub-command
    pub async fn run(&self, name: &str, matches: &ArgMatches) -> anyhow::Result<()> {
        let registered = self
            .find(name)
            .ok_or_else(|| DispatchError::UnknownCommand(name.to_string()))?;

        let input = registered.definition.input(matches);
        tracing::debug!(command = name, plugin = %registered.plugin, ?input, "dispatching");
        registered
            .definition
            .handler
            .run(&registered.api, input)
            .await
    }

    /// Parse `args` (program name first) and run the selected command
    pub async fn dispatch<I, T>(&self, args: I) -> anyhow::Result<Dispatched>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let mut cli = self.cli();

        if args.len() <= 1 {
            cli.print_help()?;
            return Ok(Dispatched::Help);
        }

        let matches = match parse_args(cli, args)? {
            Some(matches) => matches,
            None => return Ok(Dispatched::Displayed),
        };

        match matches.subcommand() {
            Some((name, sub_matches)) => {
                self.run(name, sub_matches).await?;
                Ok(Dispatched::Command(name.to_string()))
            }
            None => {
                self.cli().print_help()?;
                Ok(Dispatched::Help)
            }
        }
    }
}

/// Parse arguments; `Ok(None)` when clap already printed help or version
pub fn parse_args(cli: clap::Command, args: Vec<OsString>) -> anyhow::Result<Option<ArgMatches>> {
    match cli.try_get_matches_from(args) {
        Ok(matches) => Ok(Some(matches)),
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            e.print()?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
