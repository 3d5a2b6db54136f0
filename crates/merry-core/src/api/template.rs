//! Template compilation (minijinja) with case-conversion filters

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where template text comes from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TemplateSource {
    /// Template text
    Inline(String),
    /// A template file, relative paths resolve against the plugin directory
    File(PathBuf),
}

impl TemplateSource {
    /// Anything without a path separator is template text, the rest is a path
    pub fn parse(source: &str) -> Self {
        if source.contains('/') || source.contains('\\') {
            Self::File(PathBuf::from(source))
        } else {
            Self::Inline(source.to_string())
        }
    }

    pub fn inline(text: impl Into<String>) -> Self {
        Self::Inline(text.into())
    }

    /// Read the template text
    pub fn load(&self, base_dir: &Path) -> std::io::Result<String> {
        match self {
            Self::Inline(text) => Ok(text.clone()),
            Self::File(path) if path.is_absolute() => std::fs::read_to_string(path),
            Self::File(path) => std::fs::read_to_string(base_dir.join(path)),
        }
    }
}

impl From<String> for TemplateSource {
    fn from(source: String) -> Self {
        Self::parse(&source)
    }
}

impl From<&str> for TemplateSource {
    fn from(source: &str) -> Self {
        Self::parse(source)
    }
}

/// Options for a single compilation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Fail on undefined variables instead of rendering them empty
    pub strict: bool,
    /// HTML-escape interpolated values
    pub escape_html: bool,
}

/// Template environment shared by the templates of one plugin
#[derive(Clone)]
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_filter("camel_case", camel_case);
        env.add_filter("pascal_case", pascal_case);
        env.add_filter("proper_case", pascal_case);
        env.add_filter("kebab_case", kebab_case);
        env.add_filter("snake_case", snake_case);
        env.add_filter("constant_case", constant_case);
        Self { env }
    }

    /// Render template text against `data`
    pub fn render<S: Serialize>(
        &self,
        template: &str,
        data: S,
        options: CompileOptions,
    ) -> Result<String, minijinja::Error> {
        if options == CompileOptions::default() {
            return self.env.render_str(template, data);
        }

        let mut env = self.env.clone();
        if options.strict {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }
        if options.escape_html {
            env.set_auto_escape_callback(|_| AutoEscape::Html);
        }
        env.render_str(template, data)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Split an identifier into lowercase words on separators and case changes
fn words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = input.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // fooBar | HTTPServer -> HTTP Server
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn camel_case(value: String) -> String {
    words(&value)
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
        .collect()
}

pub fn pascal_case(value: String) -> String {
    words(&value).iter().map(|w| capitalize(w)).collect()
}

pub fn kebab_case(value: String) -> String {
    words(&value).join("-")
}

pub fn snake_case(value: String) -> String {
    words(&value).join("_")
}

pub fn constant_case(value: String) -> String {
    words(&value).join("_").to_uppercase()
}
