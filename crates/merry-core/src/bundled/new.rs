//! `new`: create a project from a GitHub repository archive

use crate::api::{PluginApi, Question};
use crate::archive;
use crate::dispatcher::{CommandHandler, CommandInput};
use crate::plugin::{Plugin, PluginError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use url::Url;

const DEFAULT_REF: &str = "HEAD";

pub struct NewPlugin;

impl Plugin for NewPlugin {
    fn install(&self, api: &PluginApi) -> Result<(), PluginError> {
        api.command("new [name]")
            .option(
                "-T, --template [template]",
                "user/repo[#ref], github:user/repo or a GitHub URL",
            )
            .option_with_default("-C, --cache", "keep the archive in the cache", true)
            .option_with_default("-F, --force", "write into a non-empty folder", true)
            .action(NewCommand)?;
        Ok(())
    }
}

/// A GitHub repository at a ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub user: String,
    pub repo: String,
    pub reference: String,
}

impl RepoRef {
    /// Parse `user/repo#ref`, `github:user/repo` or a github.com URL
    pub fn parse(src: &str) -> Result<Self> {
        let src = src.trim();
        let (path, reference) = if src.starts_with("https://") || src.starts_with("http://") {
            let url = Url::parse(src).with_context(|| format!("Invalid template URL: {}", src))?;
            if url.host_str() != Some("github.com") {
                anyhow::bail!("Only github.com repositories are supported: {}", src);
            }
            (url.path().trim_matches('/').to_string(), url.fragment().map(str::to_string))
        } else {
            let src = src
                .strip_prefix("github:")
                .or_else(|| src.strip_prefix("git@github.com:"))
                .unwrap_or(src);
            match src.split_once('#') {
                Some((path, reference)) => (path.to_string(), Some(reference.to_string())),
                None => (src.to_string(), None),
            }
        };

        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let (Some(user), Some(repo)) = (parts.next(), parts.next()) else {
            anyhow::bail!("Template must look like user/repo: {}", src);
        };

        Ok(Self {
            user: user.to_string(),
            repo: repo.trim_end_matches(".git").to_string(),
            reference: reference
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REF.to_string()),
        })
    }

    pub fn archive_url(&self) -> Result<Url> {
        let url = format!(
            "https://github.com/{}/{}/archive/{}.zip",
            self.user, self.repo, self.reference
        );
        Url::parse(&url).with_context(|| format!("Invalid archive URL: {}", url))
    }

    /// Cached archive location below `cache_root`
    pub fn cache_path(&self, cache_root: &Path) -> PathBuf {
        cache_root
            .join("merry")
            .join(&self.user)
            .join(&self.repo)
            .join(format!("{}.zip", self.reference.replace('/', "_")))
    }
}

struct NewCommand;

#[async_trait]
impl CommandHandler for NewCommand {
    async fn run(&self, api: &PluginApi, input: CommandInput) -> Result<()> {
        let answers = api.prompt(&[
            Question::input("name", "Your project name")
                .required()
                .with_default(input.get_str("name").unwrap_or_default()),
            Question::input("template", "Please provide the template address user/repo")
                .required()
                .with_default(input.get_str("template").unwrap_or_default()),
        ])?;
        let name = answer(&answers, "name")?;
        let template = answer(&answers, "template")?;

        let repo = RepoRef::parse(template)?;
        let dest = api.resolve(name);
        if is_non_empty_dir(&dest) && !input.flag("force") {
            anyhow::bail!(
                "Destination {} is not empty, use --force to write into it",
                dest.display()
            );
        }

        let cache_root = input.flag("cache").then(dirs::cache_dir).flatten();
        let bytes = fetch(&repo, cache_root.as_deref()).await?;
        let count = archive::extract_zip(&bytes, &dest, 1)?;

        api.log(format!("{} files written to {}", count, dest.display()));
        println!("done");
        Ok(())
    }
}

fn answer<'a>(answers: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a str> {
    answers
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .with_context(|| format!("{} is required", key))
}

fn is_non_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
}

/// Download the archive; with a cache, store it and fall back to it when
/// the download fails
async fn fetch(repo: &RepoRef, cache_root: Option<&Path>) -> Result<Vec<u8>> {
    let url = repo.archive_url()?;
    let client = archive::client(None)?;
    let cached = cache_root.map(|root| repo.cache_path(root));

    let spinner = cliclack::spinner();
    spinner.start(format!("Downloading {}", url));

    match archive::download(&client, &url).await {
        Ok(bytes) => {
            spinner.stop(format!("Downloaded {}/{}#{}", repo.user, repo.repo, repo.reference));
            if let Some(cached) = &cached {
                if let Err(e) = store(cached, &bytes) {
                    tracing::debug!(path = %cached.display(), error = %e, "can not cache archive");
                }
            }
            Ok(bytes)
        }
        Err(e) => match cached.filter(|p| p.is_file()) {
            Some(cached) => {
                spinner.stop(format!("Download failed, using cached {}", cached.display()));
                std::fs::read(&cached)
                    .with_context(|| format!("Failed to read {}", cached.display()))
            }
            None => {
                spinner.error("Download failed");
                Err(e)
            }
        },
    }
}

fn store(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}
