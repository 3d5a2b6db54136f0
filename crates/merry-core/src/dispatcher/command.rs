//! Command definitions registered by plugins
//!
//! Specs use the commander notation: `"new [name]"` declares a command with
//! an optional positional, `<name>` makes it required and `[files...]`
//! variadic. Option flags look like `"-T, --template [template]"`.

use crate::api::PluginApi;
use async_trait::async_trait;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandSpecError {
    #[error("command spec is empty")]
    EmptyCommand,

    #[error("malformed argument '{0}' in command spec")]
    MalformedArgument(String),

    #[error("option '{0}' declares neither a short nor a long flag")]
    MissingFlag(String),

    #[error("malformed option flags '{0}'")]
    MalformedOption(String),

    #[error("'{0}' is reserved")]
    Reserved(String),

    #[error("'{0}' is declared more than once")]
    Duplicate(String),
}

/// Names clap already uses for its own sub-command and flags
const RESERVED: [&str; 2] = ["help", "version"];

/// Handler invoked when a registered command is dispatched
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, api: &PluginApi, input: CommandInput) -> anyhow::Result<()>;
}

/// A positional argument of a command
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub required: bool,
    pub variadic: bool,
}

/// Name and positionals parsed from a command spec
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub args: Vec<ArgSpec>,
}

impl CommandSpec {
    pub fn parse(spec: &str) -> Result<Self, CommandSpecError> {
        let mut parts = spec.split_whitespace();
        let name = parts
            .next()
            .ok_or(CommandSpecError::EmptyCommand)?
            .to_string();

        let args = parts
            .map(|part| {
                let (inner, required) = if let Some(inner) =
                    part.strip_prefix('<').and_then(|p| p.strip_suffix('>'))
                {
                    (inner, true)
                } else if let Some(inner) =
                    part.strip_prefix('[').and_then(|p| p.strip_suffix(']'))
                {
                    (inner, false)
                } else {
                    return Err(CommandSpecError::MalformedArgument(part.to_string()));
                };

                let (inner, variadic) = match inner.strip_suffix("...") {
                    Some(stripped) => (stripped, true),
                    None => (inner, false),
                };
                if inner.is_empty() {
                    return Err(CommandSpecError::MalformedArgument(part.to_string()));
                }

                Ok(ArgSpec {
                    name: inner.to_string(),
                    required,
                    variadic,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { name, args })
    }
}

/// How an option consumes values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// `--force`
    Flag,
    /// `--no-link`, true unless given
    Negated,
    /// `--out [dir]`, `true` when given without a value
    OptionalValue,
    /// `--out <dir>`
    RequiredValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    /// Key in the command input (camelCase of the long flag)
    pub key: String,
    pub long: Option<String>,
    pub short: Option<char>,
    pub kind: OptionKind,
    pub description: String,
    pub default: Option<Value>,
}

impl OptionSpec {
    pub fn parse(flags: &str, description: &str) -> Result<Self, CommandSpecError> {
        let mut long = None;
        let mut short = None;
        let mut kind = OptionKind::Flag;

        for token in flags
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if let Some(name) = token.strip_prefix("--") {
                long = Some(name.to_string());
            } else if let Some(name) = token.strip_prefix('-') {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => short = Some(c),
                    _ => return Err(CommandSpecError::MalformedOption(flags.to_string())),
                }
            } else if token.starts_with('[') && token.ends_with(']') {
                kind = OptionKind::OptionalValue;
            } else if token.starts_with('<') && token.ends_with('>') {
                kind = OptionKind::RequiredValue;
            } else {
                return Err(CommandSpecError::MalformedOption(flags.to_string()));
            }
        }

        let mut default = None;
        let key = match (&long, short) {
            (Some(long_name), _) => match long_name.strip_prefix("no-") {
                Some(negated) if kind == OptionKind::Flag => {
                    kind = OptionKind::Negated;
                    default = Some(Value::Bool(true));
                    camel_key(negated)
                }
                _ => camel_key(long_name),
            },
            (None, Some(c)) => c.to_string(),
            (None, None) => return Err(CommandSpecError::MissingFlag(flags.to_string())),
        };

        Ok(Self {
            key,
            long,
            short,
            kind,
            description: description.to_string(),
            default,
        })
    }

    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.key.clone()).help(self.description.clone());
        if let Some(long) = &self.long {
            arg = arg.long(long.clone());
        }
        // -h and -V belong to clap
        if let Some(short) = self.short.filter(|c| *c != 'h' && *c != 'V') {
            arg = arg.short(short);
        }

        match self.kind {
            OptionKind::Flag => arg.action(ArgAction::SetTrue),
            OptionKind::Negated => arg.action(ArgAction::SetFalse),
            OptionKind::OptionalValue => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .default_missing_value(""),
            OptionKind::RequiredValue => arg.action(ArgAction::Set).num_args(1),
        }
    }

    fn read(&self, matches: &ArgMatches) -> Option<Value> {
        let given = matches.value_source(&self.key) == Some(ValueSource::CommandLine);
        match self.kind {
            OptionKind::Flag | OptionKind::Negated => {
                if given {
                    Some(Value::Bool(matches.get_flag(&self.key)))
                } else {
                    self.default
                        .clone()
                        .or_else(|| Some(Value::Bool(matches.get_flag(&self.key))))
                }
            }
            OptionKind::OptionalValue | OptionKind::RequiredValue => {
                match matches.get_one::<String>(&self.key) {
                    Some(v) if v.is_empty() => Some(Value::Bool(true)),
                    Some(v) => Some(Value::String(v.clone())),
                    None => self.default.clone(),
                }
            }
        }
    }
}

/// `plugin-dir` -> `pluginDir`
fn camel_key(flag: &str) -> String {
    let mut out = String::with_capacity(flag.len());
    let mut upper = false;
    for c in flag.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// A fully described command, ready to be registered
#[derive(Clone)]
pub struct CommandDefinition {
    pub spec: CommandSpec,
    pub description: String,
    pub version: String,
    pub options: Vec<OptionSpec>,
    pub handler: Arc<dyn CommandHandler>,
}

impl std::fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("spec", &self.spec)
            .field("description", &self.description)
            .field("version", &self.version)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CommandDefinition {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Reject names and flags that would clash inside the clap command
    pub fn validate(&self) -> Result<(), CommandSpecError> {
        if self.spec.name == "help" {
            return Err(CommandSpecError::Reserved(self.spec.name.clone()));
        }

        let mut ids = HashSet::new();
        for arg in &self.spec.args {
            if RESERVED.contains(&arg.name.as_str()) {
                return Err(CommandSpecError::Reserved(arg.name.clone()));
            }
            if !ids.insert(arg.name.as_str()) {
                return Err(CommandSpecError::Duplicate(arg.name.clone()));
            }
        }

        let mut longs = HashSet::new();
        let mut shorts = HashSet::new();
        for option in &self.options {
            if self.shadows_positional(option) {
                continue;
            }
            if RESERVED.contains(&option.key.as_str()) {
                return Err(CommandSpecError::Reserved(option.key.clone()));
            }
            if !ids.insert(option.key.as_str()) {
                return Err(CommandSpecError::Duplicate(option.key.clone()));
            }
            if let Some(long) = &option.long {
                if RESERVED.contains(&long.as_str()) {
                    return Err(CommandSpecError::Reserved(format!("--{}", long)));
                }
                if !longs.insert(long.as_str()) {
                    return Err(CommandSpecError::Duplicate(format!("--{}", long)));
                }
            }
            if let Some(short) = option.short {
                if !shorts.insert(short) {
                    return Err(CommandSpecError::Duplicate(format!("-{}", short)));
                }
            }
        }
        Ok(())
    }

    fn shadows_positional(&self, option: &OptionSpec) -> bool {
        self.spec.args.iter().any(|a| a.name == option.key)
    }

    /// Build the clap sub-command
    pub fn to_clap(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.spec.name.clone()).about(self.description.clone());
        if !self.version.is_empty() {
            cmd = cmd.version(self.version.clone());
        }

        for arg in &self.spec.args {
            let mut positional = Arg::new(arg.name.clone())
                .value_name(arg.name.clone())
                .required(arg.required);
            if arg.variadic {
                positional = positional
                    .action(ArgAction::Append)
                    .num_args(if arg.required { 1.. } else { 0.. });
            }
            cmd = cmd.arg(positional);
        }

        for option in &self.options {
            if self.shadows_positional(option) {
                tracing::warn!(
                    command = %self.spec.name,
                    option = %option.key,
                    "option shadows a positional argument, ignoring it"
                );
                continue;
            }
            cmd = cmd.arg(option.to_arg());
        }

        cmd
    }

    /// Collect positional and option values from parsed arguments
    pub fn input(&self, matches: &ArgMatches) -> CommandInput {
        let mut values = Map::new();

        for arg in &self.spec.args {
            if arg.variadic {
                let items: Vec<Value> = matches
                    .get_many::<String>(&arg.name)
                    .map(|vals| vals.cloned().map(Value::String).collect())
                    .unwrap_or_default();
                values.insert(arg.name.clone(), Value::Array(items));
            } else if let Some(v) = matches.get_one::<String>(&arg.name) {
                values.insert(arg.name.clone(), Value::String(v.clone()));
            }
        }

        for option in &self.options {
            if self.shadows_positional(option) {
                continue;
            }
            if let Some(v) = option.read(matches) {
                values.insert(option.key.clone(), v);
            }
        }

        CommandInput { values }
    }
}

/// Values a command was invoked with, keyed by positional name or option key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandInput {
    values: Map<String, Value>,
}

impl CommandInput {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value; `None` for missing keys and bare `--option` flags
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Boolean value; a non-empty string counts as set
    pub fn flag(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty() && s != "false",
            _ => false,
        }
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}
