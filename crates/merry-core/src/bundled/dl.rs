//! `dl`: download a file, optionally extracting it

use crate::api::PluginApi;
use crate::archive;
use crate::dispatcher::{CommandHandler, CommandInput};
use crate::plugin::{Plugin, PluginError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

const FALLBACK_FILENAME: &str = "download";

pub struct DownloadPlugin;

impl Plugin for DownloadPlugin {
    fn install(&self, api: &PluginApi) -> Result<(), PluginError> {
        api.command("dl [url]")
            .option("-e, --extract", "Try decompressing the file")
            .option("-o, --out [out]", "Where to place the downloaded files")
            .option(
                "-s, --strip [strip]",
                "Strip leading paths from file names on extraction",
            )
            .option("--filename [filename]", "Name of the saved file")
            .option("--proxy [proxy]", "Proxy endpoint")
            .action(DownloadCommand)?;
        Ok(())
    }
}

/// Where and how downloaded bytes are stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub extract: bool,
    pub strip: usize,
    pub filename: Option<String>,
}

struct DownloadCommand;

#[async_trait]
impl CommandHandler for DownloadCommand {
    async fn run(&self, api: &PluginApi, input: CommandInput) -> Result<()> {
        let Some(url) = input.get_str("url") else {
            api.log("url is required");
            return Ok(());
        };
        let url = Url::parse(url).with_context(|| format!("Invalid url: {}", url))?;
        let options = SaveOptions {
            extract: input.flag("extract"),
            strip: input
                .get_str("strip")
                .map(|s| s.parse::<usize>())
                .transpose()
                .context("--strip expects a number")?
                .unwrap_or(0),
            filename: input.get_str("filename").map(str::to_string),
        };

        let client = archive::client(input.get_str("proxy"))?;
        let bytes = match archive::download(&client, &url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                api.log(format!("download failed {:#}", e));
                return Ok(());
            }
        };

        match input.get_str("out") {
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
            Some(out) => {
                let saved = save(&bytes, &url, &api.resolve(out), &options)?;
                api.log(format!("file {} saved to {}", url, saved.display()));
            }
        }
        Ok(())
    }
}

/// Store `bytes` in `out`: extracted when requested, otherwise as a single
/// file named after the URL. Returns the path written.
pub fn save(bytes: &[u8], url: &Url, out: &Path, options: &SaveOptions) -> Result<PathBuf> {
    if options.extract {
        archive::extract_zip(bytes, out, options.strip)?;
        return Ok(out.to_path_buf());
    }

    let filename = options
        .filename
        .clone()
        .or_else(|| archive::file_name(url))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
    std::fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let path = out.join(filename);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::zip_of;

    #[test]
    fn test_save_named_after_url() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse("https://example.com/assets/logo.svg").unwrap();

        let path = save(b"<svg/>", &url, &dir.path().join("out"), &SaveOptions::default()).unwrap();

        assert_eq!(path, dir.path().join("out/logo.svg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"<svg/>");
    }

    #[test]
    fn test_save_with_filename() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse("https://example.com/").unwrap();
        let options = SaveOptions {
            filename: Some("index.html".to_string()),
            ..SaveOptions::default()
        };

        let path = save(b"<html>", &url, dir.path(), &options).unwrap();
        assert_eq!(path, dir.path().join("index.html"));
    }

    #[test]
    fn test_save_extracts_with_strip() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse("https://example.com/pkg.zip").unwrap();
        let bytes = zip_of(&[("pkg/dist/app.js", "app")]);
        let options = SaveOptions {
            extract: true,
            strip: 2,
            ..SaveOptions::default()
        };

        save(&bytes, &url, dir.path(), &options).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app.js")).unwrap(),
            "app"
        );
    }
}
