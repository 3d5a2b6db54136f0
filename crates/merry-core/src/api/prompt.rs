//! Interactive prompts
//!
//! [`Prompter`] is the seam between plugins and the terminal. The default
//! implementation uses cliclack (Charm-style inline prompts).

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Kind of answer a question expects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Input,
    Confirm,
    Select,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl Choice {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.value)
    }
}

/// A single question; the answer is stored under `name`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Question {
    pub name: String,
    pub message: String,

    #[serde(default, rename = "type")]
    pub kind: QuestionKind,

    #[serde(default)]
    pub default: Option<Value>,

    /// Re-ask until a non-empty answer is given
    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl Question {
    pub fn input(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            kind: QuestionKind::Input,
            default: None,
            required: false,
            choices: Vec::new(),
        }
    }

    pub fn confirm(name: impl Into<String>, message: impl Into<String>, default: bool) -> Self {
        Self {
            kind: QuestionKind::Confirm,
            default: Some(Value::Bool(default)),
            ..Self::input(name, message)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Default rendered as text, for input prompts
    pub fn default_text(&self) -> Option<String> {
        match &self.default {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(Value::String(_)) => None,
            Some(other) => Some(other.to_string()),
        }
    }

    pub fn default_bool(&self) -> bool {
        match &self.default {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

/// Decision for a file that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Overwrite,
    ShowDiff,
    Abort,
}

impl fmt::Display for ConflictChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConflictChoice::Overwrite => "Overwrite",
            ConflictChoice::ShowDiff => "Show diff",
            ConflictChoice::Abort => "Abort",
        };
        write!(f, "{}", label)
    }
}

pub trait Prompter: Send + Sync {
    /// Ask one question and return its answer
    fn ask(&self, question: &Question) -> std::io::Result<Value>;

    /// Decide what to do with an existing file
    fn resolve_conflict(&self, path: &Path) -> std::io::Result<ConflictChoice>;
}

/// Terminal prompts
#[derive(Debug, Clone, Copy, Default)]
pub struct CliclackPrompter;

impl Prompter for CliclackPrompter {
    fn ask(&self, question: &Question) -> std::io::Result<Value> {
        match question.kind {
            QuestionKind::Input => {
                let mut input = cliclack::input(&question.message).required(question.required);
                if let Some(default) = question.default_text() {
                    input = input.placeholder(&default).default_input(&default);
                }
                if question.required {
                    let message = format!("{} is required", question.name);
                    input = input.validate(move |value: &String| {
                        if value.trim().is_empty() {
                            Err(message.clone())
                        } else {
                            Ok(())
                        }
                    });
                }
                let answer: String = input.interact()?;
                Ok(Value::String(answer))
            }
            QuestionKind::Confirm => {
                let answer = cliclack::confirm(&question.message)
                    .initial_value(question.default_bool())
                    .interact()?;
                Ok(Value::Bool(answer))
            }
            QuestionKind::Select => {
                let mut select = cliclack::select(&question.message);
                for choice in &question.choices {
                    select = select.item(
                        choice.value.clone(),
                        choice.label(),
                        choice.hint.as_deref().unwrap_or(""),
                    );
                }
                if let Some(default) = question.default_text() {
                    select = select.initial_value(default);
                }
                let answer: String = select.interact()?;
                Ok(Value::String(answer))
            }
        }
    }

    fn resolve_conflict(&self, path: &Path) -> std::io::Result<ConflictChoice> {
        cliclack::select(format!("Conflict on '{}'", path.display()))
            .item(ConflictChoice::Overwrite, ConflictChoice::Overwrite, "y")
            .item(ConflictChoice::ShowDiff, ConflictChoice::ShowDiff, "d")
            .item(ConflictChoice::Abort, ConflictChoice::Abort, "x")
            .interact()
    }
}
